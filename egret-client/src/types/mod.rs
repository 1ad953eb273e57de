pub mod config;
pub mod http;
pub mod mode;
pub mod params;

pub use config::{ClientSettings, DEFAULT_TIMEOUT, RequestConfig};
pub use http::{ContentType, HttpMethod, Payload, RequestBody, Response, ResponseType};
pub use mode::{Reply, ResponseMode};
pub use params::{ArrayFormat, ParamsSerializer, SerializeFn};
