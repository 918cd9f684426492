mod db;
mod people;
mod schema;

pub use db::Store;
