//! Command-line options.

use std::path::PathBuf;

use gumdrop::Options;

#[derive(Debug, Options)]
pub struct Args {
    #[options(help = "print help information")]
    pub help: bool,

    #[options(short = "v", help = "print version information")]
    pub version: bool,

    #[options(short = "d", help = "enable debug logging")]
    pub debug: bool,

    #[options(
        short = "c",
        meta = "N",
        default = "8",
        help = "target connection count"
    )]
    pub connections: usize,

    #[options(no_short, meta = "PATH", default = ".spv", help = "chain store directory")]
    pub data_dir: PathBuf,

    #[options(
        no_short,
        meta = "PATH",
        help = "exclusive lock file (default: <data-dir>.lock)"
    )]
    pub lock_file: Option<PathBuf>,

    #[options(no_short, help = "remove the data directory before starting")]
    pub delete_data: bool,

    #[options(no_short, meta = "N", help = "override the advertised protocol version")]
    pub protocol_version: Option<u32>,

    #[options(no_short, meta = "PORT", help = "override the peer port")]
    pub protocol_port: Option<u16>,

    #[options(no_short, meta = "UA", help = "override the advertised user agent")]
    pub protocol_user_agent: Option<String>,
}

impl Args {
    /// The lock file path, derived from the data directory unless set.
    pub fn lock_path(&self) -> PathBuf {
        match &self.lock_file {
            Some(path) => path.clone(),
            None => {
                let mut path = self.data_dir.clone().into_os_string();
                path.push(".lock");
                PathBuf::from(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_args_default(argv).expect("arguments should parse")
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.connections, 8);
        assert_eq!(args.data_dir, PathBuf::from(".spv"));
        assert_eq!(args.lock_path(), PathBuf::from(".spv.lock"));
        assert!(!args.debug);
    }

    #[test]
    fn overrides() {
        let args = parse(&[
            "--data-dir",
            "/tmp/chain",
            "--connections",
            "3",
            "--protocol-user-agent",
            "/test:0/",
            "--debug",
        ]);
        assert_eq!(args.connections, 3);
        assert_eq!(args.data_dir, PathBuf::from("/tmp/chain"));
        assert_eq!(args.lock_path(), PathBuf::from("/tmp/chain.lock"));
        assert_eq!(args.protocol_user_agent.as_deref(), Some("/test:0/"));
        assert!(args.debug);
    }

    #[test]
    fn explicit_lock_file_wins() {
        let args = parse(&["--lock-file", "/run/spvd.lock"]);
        assert_eq!(args.lock_path(), PathBuf::from("/run/spvd.lock"));
    }

    #[test]
    fn unknown_options_are_errors() {
        assert!(Args::parse_args_default(&["--no-such-flag"]).is_err());
    }
}
