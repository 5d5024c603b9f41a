//! Assembles a runnable service from its configuration.
//!
//! Startup is deferred in two steps so that two services in one process can
//! learn each other's address before either is wired: bind a
//! [`NetworkModule`] first, then hand it to [`department_service`] or
//! [`employee_service`] together with a config naming the peer.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use orgmesh_core::{SystemClock, Topic};
use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::{build_http_client, HttpDepartmentClient, HttpEmployeeClient};
use crate::events::{
    EventPublisher, EventSubscriber, HeadcountProjection, HttpEventChannel, InMemoryEventBus,
    LoggingHandler,
};
use crate::network::handlers::{department_router, employee_router};
use crate::network::{DepartmentState, EmployeeState, NetworkModule, NodeState, ShutdownController};
use crate::resilience::ResilienceGateway;
use crate::service::{
    DeleteGuard, DepartmentService, DepartmentServiceParts, EmployeeService, EmployeeServiceParts,
    EnrichmentResolver, ServiceConfig,
};
use crate::storage::{InMemoryDepartmentRepository, InMemoryEmployeeRepository};
use crate::traits::{DepartmentLookup, EmployeeLookup, EventHandler};

pub const DEPARTMENT_SERVICE: &str = "department-service";
pub const EMPLOYEE_SERVICE: &str = "employee-service";

/// Which of the two services to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Department,
    Employee,
}

impl Role {
    #[must_use]
    pub fn service_name(self) -> &'static str {
        match self {
            Self::Department => DEPARTMENT_SERVICE,
            Self::Employee => EMPLOYEE_SERVICE,
        }
    }
}

/// How lifecycle events leave the service.
#[derive(Clone)]
pub enum EventTransport {
    /// POST to `/internal/events/{topic}` on every configured event peer.
    Http,
    /// Shared in-process bus; the service's own subscriber is pumped from it.
    Bus(InMemoryEventBus),
}

struct EventWiring {
    publisher: EventPublisher,
    http: Option<Arc<HttpEventChannel>>,
    pump: Option<JoinHandle<()>>,
}

fn wire_events(
    transport: EventTransport,
    client: &reqwest::Client,
    config: &ServiceConfig,
    subscriber: &Arc<EventSubscriber>,
) -> EventWiring {
    match transport {
        EventTransport::Http => {
            let channel = Arc::new(HttpEventChannel::start(
                client.clone(),
                config.event_targets(),
                config.resilience.call_timeout,
            ));
            EventWiring {
                publisher: EventPublisher::new(channel.clone()),
                http: Some(channel),
                pump: None,
            }
        }
        EventTransport::Bus(bus) => EventWiring {
            pump: Some(bus.spawn_pump(Arc::clone(subscriber))),
            publisher: EventPublisher::new(Arc::new(bus)),
            http: None,
        },
    }
}

/// A wired service whose listener is bound but not yet serving.
pub struct ServiceHandle {
    role: Role,
    module: NetworkModule,
    router: Router,
    local_addr: SocketAddr,
    http_events: Option<Arc<HttpEventChannel>>,
    pump: Option<JoinHandle<()>>,
}

impl ServiceHandle {
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.module.shutdown_controller()
    }

    /// Serves until `shutdown` resolves, then flushes queued events.
    ///
    /// # Errors
    ///
    /// Propagates fatal server errors.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let name = self.role.service_name();
        info!(service = name, addr = %self.local_addr, "service starting");
        let served = self.module.serve(self.router, shutdown).await;

        if let Some(channel) = self.http_events {
            channel.close().await;
        }
        if let Some(pump) = self.pump {
            pump.abort();
        }
        info!(service = name, "service stopped");
        served
    }
}

/// Base URL under which a locally bound service is reachable.
///
/// # Errors
///
/// Fails only for addresses that do not form a valid URL.
pub fn local_url(addr: SocketAddr) -> anyhow::Result<Url> {
    let host = if addr.ip().is_unspecified() {
        SocketAddr::from(([127, 0, 0, 1], addr.port()))
    } else {
        addr
    };
    Ok(Url::parse(&format!("http://{host}"))?)
}

/// Wires the department service onto an already started `module`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn department_service(
    module: NetworkModule,
    local_addr: SocketAddr,
    config: &ServiceConfig,
    transport: EventTransport,
) -> anyhow::Result<ServiceHandle> {
    let client = build_http_client(config.resilience.call_timeout)?;
    let employees: Arc<dyn EmployeeLookup> = Arc::new(HttpEmployeeClient::new(
        client.clone(),
        config.peer_url.clone(),
        config.resilience.call_timeout,
    ));
    let gateway = Arc::new(ResilienceGateway::new(EMPLOYEE_SERVICE, &config.resilience));

    let headcount = Arc::new(HeadcountProjection::new());
    let projection: Arc<dyn EventHandler> = headcount.clone();
    let logging: Arc<dyn EventHandler> = Arc::new(LoggingHandler);
    let subscriber = Arc::new(
        EventSubscriber::new()
            .register_all(Topic::EMPLOYEE, &projection)
            .register_all(Topic::EMPLOYEE, &logging),
    );
    let events = wire_events(transport, &client, config, &subscriber);

    let service = DepartmentService::new(DepartmentServiceParts {
        repository: Arc::new(InMemoryDepartmentRepository::new()),
        publisher: events.publisher,
        guard: DeleteGuard::new(
            Arc::clone(&gateway),
            Arc::clone(&employees),
            config.delete_guard_policy,
        ),
        employees_gateway: Arc::clone(&gateway),
        employees,
        headcount,
        clock: Arc::new(SystemClock),
    });
    let state = DepartmentState {
        node: NodeState {
            service_name: DEPARTMENT_SERVICE,
            shutdown: module.shutdown_controller(),
            subscriber,
            peer: gateway,
            start_time: Instant::now(),
        },
        service: Arc::new(service),
    };

    Ok(ServiceHandle {
        role: Role::Department,
        router: department_router(state),
        module,
        local_addr,
        http_events: events.http,
        pump: events.pump,
    })
}

/// Wires the employee service onto an already started `module`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn employee_service(
    module: NetworkModule,
    local_addr: SocketAddr,
    config: &ServiceConfig,
    transport: EventTransport,
) -> anyhow::Result<ServiceHandle> {
    let client = build_http_client(config.resilience.call_timeout)?;
    let departments: Arc<dyn DepartmentLookup> = Arc::new(HttpDepartmentClient::new(
        client.clone(),
        config.peer_url.clone(),
        config.resilience.call_timeout,
    ));
    let gateway = Arc::new(ResilienceGateway::new(DEPARTMENT_SERVICE, &config.resilience));

    let logging: Arc<dyn EventHandler> = Arc::new(LoggingHandler);
    let subscriber = Arc::new(EventSubscriber::new().register_all(Topic::DEPARTMENT, &logging));
    let events = wire_events(transport, &client, config, &subscriber);

    let service = EmployeeService::new(EmployeeServiceParts {
        repository: Arc::new(InMemoryEmployeeRepository::new()),
        publisher: events.publisher,
        enrichment: EnrichmentResolver::new(Arc::clone(&gateway), departments),
        clock: Arc::new(SystemClock),
    });
    let state = EmployeeState {
        node: NodeState {
            service_name: EMPLOYEE_SERVICE,
            shutdown: module.shutdown_controller(),
            subscriber,
            peer: gateway,
            start_time: Instant::now(),
        },
        service: Arc::new(service),
    };

    Ok(ServiceHandle {
        role: Role::Employee,
        router: employee_router(state),
        module,
        local_addr,
        http_events: events.http,
        pump: events.pump,
    })
}

/// Binds, wires and runs one service until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run(role: Role, config: ServiceConfig) -> anyhow::Result<()> {
    let mut module = NetworkModule::new(config.network.clone());
    let addr = module.start().await?;
    let handle = match role {
        Role::Department => department_service(module, addr, &config, EventTransport::Http)?,
        Role::Employee => employee_service(module, addr, &config, EventTransport::Http)?,
    };
    handle.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
