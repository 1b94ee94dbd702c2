use std::path::PathBuf;

use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) static_dir: PathBuf,
    pub(crate) max_upload_bytes: usize,
}
