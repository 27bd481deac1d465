pub mod csv_import;
pub mod db;
pub mod editor;
pub mod guard;
pub mod history;
pub mod library;
pub mod meals;
pub mod merge;
pub mod mirror;
pub mod models;
pub mod normalize;
pub mod nutrition;
pub mod openfoodfacts;
pub mod persistence;
pub mod remote;
pub mod service;
pub mod storage;
pub mod templates;
pub mod validation;
