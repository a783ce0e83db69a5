pub mod content;

pub use content::{
    ContentConfig, ContentRegistry, DEFAULT_REVALIDATE, GLOBAL_TAG, RegistryError, tag_for,
};
