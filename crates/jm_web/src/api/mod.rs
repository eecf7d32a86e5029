pub mod handler;
pub mod page;
mod pdf_stream;
pub mod request;
pub mod response;
pub mod wrapper;
