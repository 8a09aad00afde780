pub mod bufpool;
pub mod config;
pub mod exception;
pub mod negotiate;
pub mod param;
pub mod render;
pub mod request;
pub mod resource;
pub mod response;
pub mod template;

pub use bufpool::BufferPool;
pub use exception::Exception;
pub use negotiate::NegotiatedWriter;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use render::Renderer;
pub use request::Request;
pub use response::Response;
pub use template::TemplateRegistry;
