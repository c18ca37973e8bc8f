pub mod calendar_sink;
pub mod http_client;
