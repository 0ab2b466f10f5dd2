//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "integration-test"
//! twl_type: "test"
//! twl_scope: "code"
//! twl_description: "End-to-end provider flows over the in-memory transport."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---

use std::sync::Arc;
use std::time::Duration;

use twinlink_connect::{
    AssetConnection, AssetConnectionError, AssetConnectionManager, ConnectionConfig,
    InMemoryTransport, Method, NewDataListener, OperationProviderConfig, ProviderRegistration,
    SubscriptionProviderConfig, ValueProviderConfig, WireResponse,
};
use twinlink_model::{
    Datatype, Element, ElementReference, ElementValue, KeyKind, OperationVariable,
    StaticTypeInformation, TypeInfo, TypedValue,
};

const PERIOD: Duration = Duration::from_millis(250);

fn property_ref(name: &str) -> ElementReference {
    ElementReference::submodel_element("plant", KeyKind::Property, name)
}

fn operation_ref(name: &str) -> ElementReference {
    ElementReference::submodel_element("plant", KeyKind::Operation, name)
}

fn type_information() -> StaticTypeInformation {
    StaticTypeInformation::new()
        .with_type(property_ref("temperature"), TypeInfo::property(Datatype::Double))
        .with_type(property_ref("mode"), TypeInfo::property(Datatype::Int))
        .with_operation_inputs(
            operation_ref("calibrate"),
            vec![OperationVariable::new(Element::empty_property(
                "x",
                Datatype::Int,
            ))],
        )
        .with_operation_outputs(
            operation_ref("calibrate"),
            vec![OperationVariable::new(Element::empty_property(
                "result",
                Datatype::Int,
            ))],
        )
}

fn connection(transport: &InMemoryTransport, config: ConnectionConfig) -> AssetConnection {
    AssetConnection::with_transport(
        config,
        Arc::new(transport.clone()),
        Arc::new(type_information()),
    )
}

struct Recorder(parking_lot::Mutex<Vec<ElementValue>>);

impl Recorder {
    fn new() -> Arc<Recorder> {
        Arc::new(Recorder(parking_lot::Mutex::new(Vec::new())))
    }

    fn values(&self) -> Vec<ElementValue> {
        self.0.lock().clone()
    }
}

impl NewDataListener for Recorder {
    fn on_new_data(&self, value: ElementValue) {
        self.0.lock().push(value);
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn tick() {
    settle().await;
    tokio::time::advance(PERIOD).await;
    settle().await;
}

#[tokio::test]
async fn templated_write_produces_the_exact_payload() {
    let transport = InMemoryTransport::new();
    transport.script_response(WireResponse::ok(""));
    let connection = connection(
        &transport,
        ConnectionConfig::new("http://assets.local/").unwrap(),
    );
    connection.connect().await.unwrap();
    connection
        .register_value_provider(
            property_ref("mode"),
            ValueProviderConfig::new("/mode", "JSON")
                .unwrap()
                .with_template("{\"foo\": \"${value}\", \"bar\": [1, 2, 3]}"),
        )
        .unwrap();

    let provider = connection.value_provider(&property_ref("mode")).unwrap();
    provider
        .write(&ElementValue::Single(TypedValue::Int(5)))
        .await
        .unwrap();

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, Method::Put);
    assert_eq!(
        recorded[0].body.as_deref(),
        Some(b"{\"foo\": \"5\", \"bar\": [1, 2, 3]}".as_slice())
    );
}

#[tokio::test]
async fn invocation_issues_one_request_and_maps_the_response() {
    let transport = InMemoryTransport::new();
    transport.script_response(WireResponse::ok("{\"result\": 12}"));
    let connection = connection(
        &transport,
        ConnectionConfig::new("http://assets.local/").unwrap(),
    );
    connection.connect().await.unwrap();
    connection
        .register_operation_provider(
            operation_ref("calibrate"),
            OperationProviderConfig::new("/op", "JSON")
                .unwrap()
                .with_template("{\"x\": \"${x}\"}")
                .with_parameter_query("result", "/result"),
        )
        .unwrap();

    let provider = connection
        .operation_provider(&operation_ref("calibrate"))
        .unwrap();
    let inputs = vec![OperationVariable::new(Element::property(
        "x",
        TypedValue::Int(5),
    ))];
    let outputs = provider.invoke(&inputs, &mut []).await.unwrap();

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].path, "/op");
    assert_eq!(recorded[0].body.as_deref(), Some(b"{\"x\": \"5\"}".as_slice()));
    assert_eq!(
        outputs,
        vec![OperationVariable::new(Element::property(
            "result",
            TypedValue::Int(12),
        ))]
    );
}

#[tokio::test]
async fn provider_headers_override_connection_headers() {
    let transport = InMemoryTransport::new();
    transport.script_response(WireResponse::ok("20.5"));
    let connection = connection(
        &transport,
        ConnectionConfig::new("http://assets.local/")
            .unwrap()
            .with_header("X-Tenant", "plant-4")
            .with_header("Accept", "text/plain"),
    );
    connection.connect().await.unwrap();
    connection
        .register_value_provider(
            property_ref("temperature"),
            ValueProviderConfig::new("/t", "JSON")
                .unwrap()
                .with_header("Accept", "application/json"),
        )
        .unwrap();

    connection
        .value_provider(&property_ref("temperature"))
        .unwrap()
        .read()
        .await
        .unwrap();

    let headers = &transport.recorded()[0].headers;
    assert_eq!(headers["X-Tenant"], "plant-4");
    assert_eq!(headers["Accept"], "application/json");
}

#[tokio::test(start_paused = true)]
async fn subscription_delivers_one_sample_per_interval_in_order() {
    let transport = InMemoryTransport::new();
    transport.script_response(WireResponse::ok("1"));
    transport.script_response(WireResponse::ok("2"));
    transport.script_response(WireResponse::ok("3"));
    let connection = connection(
        &transport,
        ConnectionConfig::new("http://assets.local/").unwrap(),
    );
    connection.connect().await.unwrap();
    connection
        .register_subscription_provider(
            property_ref("mode"),
            SubscriptionProviderConfig::new("/mode", "JSON", PERIOD).unwrap(),
        )
        .unwrap();

    let provider = connection
        .subscription_provider(&property_ref("mode"))
        .unwrap();
    let recorder = Recorder::new();
    let id = provider.add_listener(recorder.clone()).await.unwrap();

    for _ in 0..3 {
        tick().await;
    }
    assert_eq!(
        recorder.values(),
        vec![
            ElementValue::Single(TypedValue::Int(1)),
            ElementValue::Single(TypedValue::Int(2)),
            ElementValue::Single(TypedValue::Int(3)),
        ]
    );
    assert_eq!(transport.request_count(), 3);

    // Tearing the listener down stops the polling entirely.
    provider.remove_listener(id).await.unwrap();
    tick().await;
    tick().await;
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_configured_subscriptions() {
    let transport = InMemoryTransport::new();
    transport.script_repeated("1", 10);
    let mut config = ConnectionConfig::new("http://assets.local/").unwrap();
    config.subscription_providers.push(ProviderRegistration {
        reference: property_ref("mode"),
        config: SubscriptionProviderConfig::new("/mode", "JSON", PERIOD).unwrap(),
    });
    let connection = connection(&transport, config);
    connection.connect().await.unwrap();

    let provider = connection
        .subscription_provider(&property_ref("mode"))
        .unwrap();
    provider.add_listener(Recorder::new()).await.unwrap();
    tick().await;
    assert_eq!(transport.request_count(), 1);

    connection.disconnect().await.unwrap();
    tick().await;
    tick().await;
    assert_eq!(transport.request_count(), 1);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn duplicate_provider_registration_is_rejected() {
    let connection = connection(
        &InMemoryTransport::new(),
        ConnectionConfig::new("http://assets.local/").unwrap(),
    );
    let config = ValueProviderConfig::new("/t", "JSON").unwrap();
    connection
        .register_value_provider(property_ref("temperature"), config.clone())
        .unwrap();
    assert!(matches!(
        connection.register_value_provider(property_ref("temperature"), config),
        Err(AssetConnectionError::Configuration(_))
    ));
}

#[tokio::test]
async fn manager_routes_requests_by_reference() {
    let transport = InMemoryTransport::new();
    transport.script_response(WireResponse::ok("36.6"));
    let mut config = ConnectionConfig::new("http://assets.local/").unwrap();
    config.value_providers.push(ProviderRegistration {
        reference: property_ref("temperature"),
        config: ValueProviderConfig::new("/t", "JSON").unwrap(),
    });
    let mut manager = AssetConnectionManager::new();
    manager.add(Arc::new(connection(&transport, config)));
    manager.connect_all().await.unwrap();

    let value = manager
        .value_provider(&property_ref("temperature"))
        .unwrap()
        .read()
        .await
        .unwrap();
    assert_eq!(value, ElementValue::Single(TypedValue::Double(36.6)));

    manager.disconnect_all().await.unwrap();
    assert!(!transport.is_connected());
}
