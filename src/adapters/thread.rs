//! Network adapter: OpenThread stack bring-up and the collector connection.
//!
//! Implements [`NetworkPort`]. `start` initialises the stack and spawns a
//! monitor thread that polls the stack state and keeps the readiness bits
//! (role, routable address, neighbors) current in the shared flag set.
//! `connect` opens the long-lived TCP stream with [`TcpTransport`].
//!
//! On the host, [`SimNetwork`] publishes readiness after a configurable
//! delay and connects over the host's own IP stack.

use core::net::SocketAddr;
use core::time::Duration;
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::NetworkPort;
use crate::error::NetworkError;
use crate::events::EventFlags;
use crate::net::readiness::{self, StackSnapshot};
use crate::net::transport::TcpTransport;

/// How often the monitor re-reads the stack state.
const MONITOR_PERIOD: Duration = Duration::from_millis(500);

fn open_link(
    remote: SocketAddr,
    connect_timeout: Duration,
    send_timeout: Duration,
) -> Result<TcpTransport, NetworkError> {
    TcpTransport::connect(remote, connect_timeout, send_timeout).map_err(|e| {
        warn!("connect to {} failed: {}", remote, e);
        NetworkError::Connect
    })
}

/// Poll `read` every [`MONITOR_PERIOD`] and publish the readiness it implies.
fn spawn_monitor<F>(status: Arc<EventFlags>, mut read: F) -> Result<(), NetworkError>
where
    F: FnMut() -> StackSnapshot + Send + 'static,
{
    std::thread::Builder::new()
        .name("net-monitor".into())
        .stack_size(4096)
        .spawn(move || {
            let mut last = 0;
            loop {
                let bits = readiness::evaluate(&read());
                if bits != last {
                    info!("network: {}", readiness::describe(bits));
                    last = bits;
                }
                readiness::publish(&status, bits);
                std::thread::sleep(MONITOR_PERIOD);
            }
        })
        .map(|_| ())
        .map_err(|_| NetworkError::StackStart(-1))
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF OpenThread
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::ThreadNetwork;

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use core::net::Ipv6Addr;
    use esp_idf_svc::sys::*;

    pub struct ThreadNetwork {
        send_timeout: Duration,
    }

    impl ThreadNetwork {
        pub fn new(send_timeout: Duration) -> Self {
            Self { send_timeout }
        }
    }

    /// Read role, unicast addresses and neighbor count under the OT lock.
    fn snapshot() -> StackSnapshot {
        let mut snap = StackSnapshot::default();
        // SAFETY: the OpenThread instance outlives the monitor; every ot*
        // call below happens while holding the stack lock.
        unsafe {
            if !esp_openthread_lock_acquire(portMAX_DELAY) {
                return snap;
            }
            let instance = esp_openthread_get_instance();

            let role = otThreadGetDeviceRole(instance);
            snap.attached = role != otDeviceRole_OT_DEVICE_ROLE_DISABLED
                && role != otDeviceRole_OT_DEVICE_ROLE_DETACHED;

            let mut addr = otIp6GetUnicastAddresses(instance);
            while !addr.is_null() {
                let octets = (*addr).mAddress.mFields.m8;
                if snap.addresses.push(Ipv6Addr::from(octets)).is_err() {
                    break;
                }
                addr = (*addr).mNext;
            }

            let mut iter: otNeighborInfoIterator = OT_NEIGHBOR_INFO_ITERATOR_INIT as _;
            let mut info: otNeighborInfo = core::mem::zeroed();
            while otThreadGetNextNeighborInfo(instance, &mut iter, &mut info) == otError_OT_ERROR_NONE
            {
                snap.neighbors += 1;
            }

            esp_openthread_lock_release();
        }
        snap
    }

    impl NetworkPort for ThreadNetwork {
        type Link = TcpTransport;

        fn start(&mut self, status: Arc<EventFlags>) -> Result<(), NetworkError> {
            let config = esp_openthread_platform_config_t {
                radio_config: esp_openthread_radio_config_t {
                    radio_mode: esp_openthread_radio_mode_t_RADIO_MODE_NATIVE,
                    ..Default::default()
                },
                host_config: esp_openthread_host_connection_config_t {
                    host_connection_mode:
                        esp_openthread_host_connection_mode_t_HOST_CONNECTION_MODE_NONE,
                    ..Default::default()
                },
                port_config: esp_openthread_port_config_t {
                    storage_partition_name: c"nvs".as_ptr(),
                    netif_queue_size: 10,
                    task_queue_size: 10,
                },
            };

            // SAFETY: called once from the startup path; config is copied by
            // the stack before returning.
            unsafe {
                let netif_cfg = esp_netif_config_t {
                    base: &_g_esp_netif_inherent_openthread_config,
                    driver: core::ptr::null(),
                    stack: _g_esp_netif_netstack_default_openthread,
                };
                let netif = esp_netif_new(&netif_cfg);
                if netif.is_null() {
                    return Err(NetworkError::StackStart(ESP_FAIL));
                }

                let ret = esp_openthread_init(&config);
                if ret != ESP_OK {
                    return Err(NetworkError::StackStart(ret));
                }
                let ret = esp_netif_attach(netif, esp_openthread_netif_glue_init(&config).cast());
                if ret != ESP_OK {
                    return Err(NetworkError::StackStart(ret));
                }

                let instance = esp_openthread_get_instance();
                otIp6SetEnabled(instance, true);
                otThreadSetEnabled(instance, true);
            }

            std::thread::Builder::new()
                .name("ot-main".into())
                .stack_size(8192)
                .spawn(|| {
                    // Runs the OpenThread main loop until the stack stops.
                    let ret = unsafe { esp_openthread_launch_mainloop() };
                    warn!("openthread: mainloop exited (rc={})", ret);
                })
                .map_err(|_| NetworkError::StackStart(ESP_FAIL))?;

            info!("openthread: started");
            spawn_monitor(status, snapshot)
        }

        fn connect(
            &mut self,
            remote: SocketAddr,
            timeout: Duration,
        ) -> Result<TcpTransport, NetworkError> {
            open_link(remote, timeout, self.send_timeout)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host stand-in: reports a fully attached node after `ready_after`.
pub struct SimNetwork {
    ready_after: Option<Duration>,
    send_timeout: Duration,
    fail_start: bool,
}

impl SimNetwork {
    pub fn new(ready_after: Duration, send_timeout: Duration) -> Self {
        Self {
            ready_after: Some(ready_after),
            send_timeout,
            fail_start: false,
        }
    }

    /// A stack that starts but never becomes ready.
    pub fn never_ready(send_timeout: Duration) -> Self {
        Self {
            ready_after: None,
            send_timeout,
            fail_start: false,
        }
    }

    /// A stack that refuses to start.
    pub fn broken() -> Self {
        Self {
            ready_after: None,
            send_timeout: Duration::from_secs(1),
            fail_start: true,
        }
    }
}

impl NetworkPort for SimNetwork {
    type Link = TcpTransport;

    fn start(&mut self, status: Arc<EventFlags>) -> Result<(), NetworkError> {
        if self.fail_start {
            return Err(NetworkError::StackStart(-1));
        }
        info!("network(sim): started");
        let started = std::time::Instant::now();
        let ready_after = self.ready_after;
        spawn_monitor(status, move || {
            let mut snap = StackSnapshot::default();
            if ready_after.is_some_and(|d| started.elapsed() >= d) {
                snap.attached = true;
                let _ = snap
                    .addresses
                    .push(core::net::Ipv6Addr::new(0xfd04, 0x2240, 0, 0, 0, 0, 0, 2));
                snap.neighbors = 1;
            }
            snap
        })
    }

    fn connect(&mut self, remote: SocketAddr, timeout: Duration) -> Result<TcpTransport, NetworkError> {
        open_link(remote, timeout, self.send_timeout)
    }
}
