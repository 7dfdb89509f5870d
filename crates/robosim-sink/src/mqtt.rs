//! MQTT 后端（`mqtt` feature）
//!
//! 使用 rumqttc 同步客户端。连接由后台线程驱动（`Connection::iter()`），
//! 线程根据 ConnAck/断开事件维护就绪标志；发布使用 `try_publish`，
//! 请求队列满时返回错误而不阻塞运行线程。

use crate::{SinkError, TelemetrySink};
use parking_lot::Mutex;
use rumqttc::{Client, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// MQTT 连接配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSinkConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// 请求队列容量
    pub request_capacity: usize,
}

impl Default for MqttSinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "robosim".to_string(),
            keep_alive: Duration::from_secs(60),
            request_capacity: 64,
        }
    }
}

/// MQTT 后端
///
/// Drop 时先设置停止标志并断开连接，再等待连接线程退出。
pub struct MqttSink {
    client: Mutex<Client>,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    conn_thread: Option<JoinHandle<()>>,
    broker: String,
}

impl MqttSink {
    /// 创建客户端并启动连接线程
    ///
    /// 返回时连接未必已经建立，可以用 [`MqttSink::wait_connected`] 等待。
    pub fn connect(config: &MqttSinkConfig) -> Result<Self, SinkError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);

        let (client, mut connection) = Client::new(options, config.request_capacity);
        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let broker = format!("{}:{}", config.host, config.port);

        let connected_flag = connected.clone();
        let stop_flag = stop.clone();
        let broker_name = broker.clone();
        let conn_thread = std::thread::Builder::new()
            .name("robosim-mqtt".to_string())
            .spawn(move || {
                for notification in connection.iter() {
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            if ack.code == ConnectReturnCode::Success {
                                info!("Connected to MQTT broker {}", broker_name);
                                connected_flag.store(true, Ordering::Release);
                            } else {
                                warn!("MQTT broker {} refused connection: {:?}", broker_name, ack.code);
                                connected_flag.store(false, Ordering::Release);
                            }
                        },
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            info!("MQTT broker {} closed the connection", broker_name);
                            connected_flag.store(false, Ordering::Release);
                        },
                        Ok(event) => debug!("MQTT event: {:?}", event),
                        Err(e) => {
                            if connected_flag.swap(false, Ordering::AcqRel) {
                                warn!("Lost connection to MQTT broker {}: {}", broker_name, e);
                            } else {
                                debug!("MQTT connection attempt failed: {}", e);
                            }
                            if stop_flag.load(Ordering::Acquire) {
                                break;
                            }
                            // rumqttc 会在下一次轮询时重连
                            std::thread::sleep(Duration::from_secs(1));
                        },
                    }
                }
                debug!("MQTT connection thread exited");
            })?;

        Ok(Self {
            client: Mutex::new(client),
            connected,
            stop,
            conn_thread: Some(conn_thread),
            broker,
        })
    }

    /// 等待连接建立，超时返回 `false`
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_ready() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        self.is_ready()
    }

    /// 代理地址（`host:port`）
    pub fn broker(&self) -> &str {
        &self.broker
    }
}

impl TelemetrySink for MqttSink {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        if !self.is_ready() {
            return Err(SinkError::NotConnected);
        }
        self.client
            .lock()
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| SinkError::Backend(e.to_string()))
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.client.lock().disconnect() {
            debug!("MQTT disconnect request failed: {}", e);
        }
        if let Some(handle) = self.conn_thread.take()
            && handle.join().is_err()
        {
            warn!("MQTT connection thread panicked");
        }
    }
}
