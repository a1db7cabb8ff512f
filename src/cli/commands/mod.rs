pub mod auth;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("vetrina")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("VETRINA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("users-path")
                .short('u')
                .long("users-path")
                .help("Path to the JSON user store")
                .long_help(
                    "Path to the JSON user store. The file and any missing parent directories are created on first write.",
                )
                .env("VETRINA_USERS_PATH")
                .default_value("data/users.json"),
        );

    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to clear env vars so host configuration does not leak into tests
    fn with_cleared_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("VETRINA_PORT", None::<&str>),
                ("VETRINA_USERS_PATH", None),
                ("VETRINA_PUBLIC_BASE_URL", None),
                ("VETRINA_SESSION_TTL_SECONDS", None),
                ("VETRINA_SESSION_KEY", None),
                ("VETRINA_ADMIN_IDENTIFIER", None),
                ("VETRINA_ADMIN_SECRET", None),
                ("VETRINA_OTP_MASTER_CODE", None),
                ("VETRINA_GOOGLE_CLIENT_ID", None),
                ("VETRINA_GOOGLE_CLIENT_SECRET", None),
                ("VETRINA_GOOGLE_REDIRECT_URL", None),
                ("VETRINA_LOG_LEVEL", None),
            ],
            f,
        )
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "vetrina");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port_and_users_path() {
        with_cleared_env(|| {
            let command = new();
            let matches = command.get_matches_from(vec![
                "vetrina",
                "--port",
                "9090",
                "--users-path",
                "/tmp/vetrina-users.json",
                "--public-base-url",
                "https://shop.example.com",
            ]);

            assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
            assert_eq!(
                matches.get_one::<String>("users-path").cloned(),
                Some("/tmp/vetrina-users.json".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("public-base-url").cloned(),
                Some("https://shop.example.com".to_string())
            );
        });
    }

    #[test]
    fn test_check_defaults() {
        with_cleared_env(|| {
            let command = new();
            let matches = command.get_matches_from(vec!["vetrina"]);

            assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
            assert_eq!(
                matches.get_one::<String>("users-path").cloned(),
                Some("data/users.json".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("public-base-url").cloned(),
                Some("http://localhost:3005".to_string())
            );
            assert_eq!(
                matches.get_one::<u64>("session-ttl-seconds").copied(),
                Some(604_800)
            );
            assert_eq!(matches.get_one::<String>("session-key"), None);
            assert_eq!(matches.get_one::<String>("admin-identifier"), None);
            assert_eq!(matches.get_one::<String>("google-client-id"), None);
            assert_eq!(
                matches.get_one::<String>("google-redirect-url").cloned(),
                Some("http://localhost:8080/auth/federated/callback".to_string())
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("VETRINA_PORT", Some("443")),
                ("VETRINA_USERS_PATH", Some("/var/lib/vetrina/users.json")),
                ("VETRINA_PUBLIC_BASE_URL", Some("https://shop.example.com")),
                ("VETRINA_SESSION_TTL_SECONDS", Some("3600")),
                ("VETRINA_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["vetrina"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("users-path").cloned(),
                    Some("/var/lib/vetrina/users.json".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("public-base-url").cloned(),
                    Some("https://shop.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<u64>("session-ttl-seconds").copied(),
                    Some(3600)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("VETRINA_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["vetrina"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("VETRINA_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["vetrina".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_admin_bypass_requires_pair() {
        with_cleared_env(|| {
            let command = new();
            let result = command
                .try_get_matches_from(vec!["vetrina", "--admin-identifier", "ops@example.com"]);
            assert_eq!(
                result.map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn test_google_requires_pair() {
        with_cleared_env(|| {
            let command = new();
            let result =
                command.try_get_matches_from(vec!["vetrina", "--google-client-id", "client-id"]);
            assert_eq!(
                result.map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
