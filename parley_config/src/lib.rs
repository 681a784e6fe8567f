mod schema;

pub use schema::{
    API_KEY_ENV, Config, ProviderSection, ReleaseSection, RetrySection, SessionSection,
};
