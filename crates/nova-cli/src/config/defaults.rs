use std::path::PathBuf;

pub fn default_out_dir() -> PathBuf {
    PathBuf::from(".nova")
}

pub fn default_pages_dir() -> PathBuf {
    PathBuf::from("src/pages")
}

pub fn default_api_base() -> String {
    "/api".to_string()
}

pub fn default_host() -> String {
    "localhost".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_route_module_concurrency() -> usize {
    8
}

pub fn default_discovery_ms() -> u64 {
    250
}

pub fn default_sync_ms() -> u64 {
    500
}

pub fn default_esbuild() -> String {
    "esbuild".to_string()
}

pub fn default_node() -> String {
    "node".to_string()
}

pub fn default_node_modules() -> PathBuf {
    PathBuf::from("node_modules")
}
