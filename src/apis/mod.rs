pub mod incobh;
pub mod port_of_cork;

pub use incobh::InCobhCrawler;
pub use port_of_cork::PortOfCorkCrawler;
