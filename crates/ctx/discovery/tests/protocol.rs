//! Requests in, replies out: codes and paging through the protocol handler.

use std::sync::Arc;

use ctx_discovery::{
    DiscoveryMediator, LookupRequest, MediatorConfig, ProtocolHandler, Reply, ReplyBody, Request,
    RequestBody, SubscribeRequest,
};
use ctx_lease::{handshake, LeaseConfig};
use ctx_query::QueryItem;
use ctx_transport::{Endpoint, InMemoryTransport};
use ctx_types::{
    Attribute, Attributes, ComponentDescription, ComponentId, ComponentType, DataObject, ErrorCode,
    FromDataObject, Lease, SubscriptionId, ToDataObject, UpdateMode,
};

fn handler() -> ProtocolHandler {
    let config = MediatorConfig {
        id: "disc".to_string(),
        lease: LeaseConfig::fast(),
        ..MediatorConfig::default()
    };
    let (mediator, _channels) =
        DiscoveryMediator::in_memory(config, Arc::new(InMemoryTransport::new()));
    ProtocolHandler::new(Arc::new(mediator))
}

async fn send(handler: &ProtocolHandler, request: Request) -> Reply {
    let reply = handler.handle(request.to_data_object()).await;
    Reply::from_data_object(&reply).unwrap()
}

fn register(id: &str, room: &str) -> Request {
    Request::new(
        "disc",
        RequestBody::Register {
            description: ComponentDescription::new(id, ComponentType::Widget)
                .with_constant(Attribute::new("room", room)),
            lease: None,
        },
    )
}

fn query(query: Option<QueryItem>, page_size: Option<usize>) -> Request {
    Request::new("disc", RequestBody::Query { query, page_size })
}

#[tokio::test(start_paused = true)]
async fn test_register_and_query() {
    let handler = handler();

    let reply = send(&handler, register("w1", "kitchen")).await;
    assert_eq!(reply.code, ErrorCode::NoError);
    assert_eq!(
        reply.body,
        ReplyBody::Lease(Lease::new(LeaseConfig::fast().default_duration))
    );

    let reply = send(
        &handler,
        query(Some(QueryItem::attribute_equals("room", "kitchen")), None),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::NoError);
    match reply.body {
        ReplyBody::Components(page) => {
            assert_eq!(page.components.len(), 1);
            assert_eq!(page.components[0].id, ComponentId::new("w1"));
            assert!(page.cursor.is_none());
        }
        other => panic!("expected components, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_query_codes() {
    let handler = handler();
    send(&handler, register("w1", "kitchen")).await;

    let reply = send(&handler, query(None, None)).await;
    assert_eq!(reply.code, ErrorCode::EmptyQuery);

    let reply = send(
        &handler,
        query(Some(QueryItem::attribute_equals("room", "attic")), None),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::EmptyResult);
    assert!(matches!(reply.body, ReplyBody::Components(ref page) if page.is_empty()));

    // A queryAnd with no children is structurally invalid.
    let malformed = DataObject::new("request")
        .with_child(DataObject::leaf("target", "disc"))
        .with_child(
            DataObject::new("query")
                .with_child(DataObject::new("predicate").with_child(DataObject::new("queryAnd"))),
        );
    let reply = Reply::from_data_object(&handler.handle(malformed).await).unwrap();
    assert_eq!(reply.code, ErrorCode::InvalidQuery);
}

#[tokio::test(start_paused = true)]
async fn test_identity_check() {
    let handler = handler();

    let reply = send(
        &handler,
        Request::new(
            "someone-else",
            RequestBody::Unregister {
                id: ComponentId::new("w1"),
            },
        ),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::InvalidId);

    let reply = send(
        &handler,
        Request::untargeted(RequestBody::Unregister {
            id: ComponentId::new("w1"),
        }),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::InvalidId);

    // Lookups are multicast and carry no target.
    let reply = send(
        &handler,
        Request::untargeted(RequestBody::LookupDiscoverer(LookupRequest {
            caller: ComponentId::new("w1"),
            hostname: "sensor".to_string(),
            host_address: "10.0.0.7".to_string(),
            port: 5001,
        })),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::NoError);
    match reply.body {
        ReplyBody::Discoverer(summary) => {
            assert_eq!(summary.id, ComponentId::new("disc"));
            assert_eq!(summary.component_type, ComponentType::Discoverer);
        }
        other => panic!("expected discoverer, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_mutation_codes() {
    let handler = handler();
    send(&handler, register("w1", "kitchen")).await;

    let update = |id: &str, attribute: Attribute| {
        Request::new(
            "disc",
            RequestBody::Update {
                id: ComponentId::new(id),
                attributes: Attributes::new().with(attribute),
                mode: UpdateMode::Add,
                lease: None,
            },
        )
    };

    let reply = send(&handler, update("w1", Attribute::new("temperature", 22))).await;
    assert_eq!(reply, Reply::ok(ReplyBody::Empty));

    let reply = send(&handler, update("ghost", Attribute::new("temperature", 22))).await;
    assert_eq!(reply.code, ErrorCode::UnknownComponent);

    let reply = send(&handler, update("w1", Attribute::new("room", "hall"))).await;
    assert_eq!(reply.code, ErrorCode::InvalidAttribute);

    let reply = send(
        &handler,
        Request::new(
            "disc",
            RequestBody::Unsubscribe {
                subscription: SubscriptionId::generate(),
            },
        ),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::UnknownSubscriber);

    let reply = send(
        &handler,
        Request::new(
            "disc",
            RequestBody::Subscribe(SubscribeRequest {
                subscriber: ComponentId::new("app"),
                target: Endpoint::new("10.0.0.9", 7001),
                callback: "componentMoved".to_string(),
                full: false,
                query: Some(QueryItem::type_is(ComponentType::Widget)),
            }),
        ),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::UnknownCallback);

    let reply = send(
        &handler,
        Request::new(
            "disc",
            RequestBody::RenewLease {
                id: ComponentId::new("w1"),
                lease: Lease::from_millis(2_000),
            },
        ),
    )
    .await;
    assert_eq!(reply, Reply::ok(ReplyBody::Lease(Lease::from_millis(2_000))));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_messages_are_invalid_data() {
    let handler = handler();

    let reply = handler.handle(DataObject::leaf("hello", "there")).await;
    assert_eq!(
        Reply::from_data_object(&reply).unwrap().code,
        ErrorCode::InvalidData
    );

    let no_type = DataObject::new("request")
        .with_child(DataObject::leaf("target", "disc"))
        .with_child(
            DataObject::new("register")
                .with_child(DataObject::new("component").with_child(DataObject::leaf("id", "w1"))),
        );
    let reply = handler.handle(no_type).await;
    assert_eq!(
        Reply::from_data_object(&reply).unwrap().code,
        ErrorCode::InvalidData
    );
}

#[tokio::test(start_paused = true)]
async fn test_paging() {
    let handler = handler();
    for i in 0..5 {
        send(&handler, register(&format!("w{i}"), "kitchen")).await;
    }

    let widgets = QueryItem::type_is(ComponentType::Widget);
    let mut seen = Vec::new();
    let mut reply = send(&handler, query(Some(widgets), Some(2))).await;
    loop {
        assert_eq!(reply.code, ErrorCode::NoError);
        let ReplyBody::Components(page) = reply.body else {
            panic!("expected components");
        };
        assert!(page.components.len() <= 2);
        seen.extend(page.components.into_iter().map(|summary| summary.id));

        match page.cursor {
            Some(cursor) => {
                reply = send(
                    &handler,
                    Request::new("disc", RequestBody::QueryNext { cursor }),
                )
                .await;
            }
            None => break,
        }
    }

    let expected: Vec<_> = (0..5).map(|i| ComponentId::new(format!("w{i}"))).collect();
    assert_eq!(seen, expected);

    let reply = send(
        &handler,
        Request::new(
            "disc",
            RequestBody::QueryNext {
                cursor: "cursor:unknown".to_string(),
            },
        ),
    )
    .await;
    assert_eq!(reply.code, ErrorCode::QueryNotFound);
}

#[tokio::test(start_paused = true)]
async fn test_discoverer_answers_ping() {
    let handler = handler();
    let reply = handler
        .handle(handshake::ping_request(&ComponentId::new("disc")))
        .await;
    assert!(handshake::check_pong(&ComponentId::new("disc"), &reply).is_ok());
}
