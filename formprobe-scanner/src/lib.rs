pub mod crawler;
pub mod error;
pub mod extract;
#[cfg(feature = "headless")]
pub mod headless;
pub mod render;
pub mod result;
pub mod robots;
pub mod scope;
pub mod session;

pub use crawler::{ProgressCallback, StaticCrawler};
pub use error::ScanError;
#[cfg(feature = "headless")]
pub use headless::HeadlessSession;
pub use render::RenderCrawler;
pub use result::{ExtractionResult, Field, Form, Method};
pub use robots::RobotsPolicy;
pub use scope::{Admission, CrawlTask, Frontier, Origin, normalize_url};
pub use session::{FrameHandle, HttpSession, RenderedSession};
