//! 价格表：上传（整体替换）与分页读取

pub mod handler;
pub mod model;
pub mod parser;
pub mod repository;
pub mod route;
pub mod service;

pub use handler::AppState;
pub use model::{PageRequest, Product, UploadReport};
pub use repository::PriceListRepository;
pub use service::PriceListService;
