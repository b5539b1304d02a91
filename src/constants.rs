pub const SERVER_PORT: u16 = 3000;
pub const DATABASE_PATH: &str = "campaign.db";
pub const SITE_URL: &str = "https://retrograve.tv";

#[cfg(feature = "production")]
pub const ORIGIN_URL_ENDSWITH: &[u8] = b"retrograve.tv";

// upstream apis
pub const X_API_URL: &str = "https://api.x.com";
pub const X_SEARCH_RECENT_PATH: &str = "/2/tweets/search/recent";
pub const HELIUS_RPC_URL: &str = "https://mainnet.helius-rpc.com";
pub const HELIUS_REST_URL: &str = "https://api.helius.xyz";
pub const DAS_REQUEST_ID: &str = "retrograve-nfts";
pub const DAS_PAGE_LIMIT: usize = 500;
/// Upper bound on pages walked per listing; a wallet would need millions of assets to reach it.
pub const DAS_MAX_PAGES: u32 = 9999;

// campaign
pub const DEFAULT_HASHTAGS: &str = "#RetroGrave #RetroGraveLaunch";
pub const REFRESH_BATCH_SIZE: u8 = 25;
pub const PREVIEW_BATCH_SIZE: u8 = 10;
pub const LEADERBOARD_DEFAULT_LIMIT: i64 = 10;
pub const LEADERBOARD_MAX_LIMIT: i64 = 500;

pub const WEIGHT_ORIGINAL: f64 = 2.0;
pub const WEIGHT_QUOTE: f64 = 1.5;
pub const WEIGHT_REPLY: f64 = 1.0;
pub const WEIGHT_RETWEET: f64 = 0.5;

// image proxy
pub const PROXY_USER_AGENT: &str = "Mozilla/5.0 (RetroGrave Proxy)";
pub const PROXY_CACHE_CONTROL: &str = "public, max-age=3600, immutable";
pub const MAX_FETCH_BYTES: usize = 16 * 1024 * 1024;

// outbound http
pub const UPSTREAM_TIMEOUT_SECS: u64 = 20;
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 5;

// compositor
pub const LAYERS_DIR: &str = "public/collections/magapixel/layers";

/// Trait layers in the order they are painted. Backgrounds are never drawn from a layer.
pub const LAYER_ORDER: [&str; 6] = ["Skin", "Face", "Body", "Head", "Glasses", "Hand"];
pub const LAYER_EXTENSIONS: [&str; 2] = ["png", "webp"];

pub const DEFAULT_BACKGROUND: &str = "#3e2d75";
pub const EMPTY_BACKGROUND: &str = "#2b2146";
pub const PREVIEW_SCALE: f64 = 0.58;
pub const MAX_EXPORT_DIMENSION: u32 = 4096;
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
/// Decoded images wider or taller than this are refused before any pixels are allocated.
pub const MAX_DECODE_DIMENSION: u32 = 8192;
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

// site metadata: (path, change frequency, priority)
pub const SITEMAP_PAGES: [(&str, &str, f32); 3] = [
    ("/", "weekly", 1.0),
    ("/retrogs", "weekly", 0.9),
    ("/locker", "weekly", 0.6),
];
