//! External command-line tools.

pub mod ytdlp;

pub use ytdlp::YtDlpDownloader;
