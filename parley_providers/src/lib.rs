mod release;
mod zhipu;

pub use release::GithubReleases;
pub use zhipu::{DEFAULT_BASE_URL, ZhipuClient, ZhipuFactory, ZhipuTokenizer};
