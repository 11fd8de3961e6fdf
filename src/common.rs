use std::future::Future;
use std::pin::Pin;

pub mod collections;
pub mod config;
pub mod log;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
