//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements            | Connects to                    |
//! |----------------|-----------------------|--------------------------------|
//! | `hardware`     | SensorPort, RelayPort | any sensor + relay pair        |
//! | `log_observer` | ObserverPort          | log output / bounded channel   |
//! | `log_sink`     | EventSink             | log output / in-memory record  |
//! | `loopback`     | TransportPort         | in-process broker              |
//! | `mqtt`         | TransportPort         | MQTT broker (rumqttc)          |
//! | `relay_pin`    | RelayPort             | embedded-hal output pin        |
//! | `sim_sensor`   | SensorPort            | scripted readings              |
//! | `time`         | ClockPort             | monotonic / manual clock       |

pub mod hardware;
pub mod log_observer;
pub mod log_sink;
pub mod loopback;
pub mod mqtt;
pub mod relay_pin;
pub mod sim_sensor;
pub mod time;
