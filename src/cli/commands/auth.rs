use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_bypass_args(command);
    with_google_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .help("Public storefront base URL used for redirects and cookie policy")
                .env("VETRINA_PUBLIC_BASE_URL")
                .default_value("http://localhost:3005"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("VETRINA_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("session-key")
                .long("session-key")
                .help("PASERK k4.secret key used to sign session tokens")
                .long_help(
                    "PASERK k4.secret key used to sign session tokens. When omitted an ephemeral key is generated and sessions do not survive a restart.",
                )
                .env("VETRINA_SESSION_KEY"),
        )
}

fn with_bypass_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("admin-identifier")
                .long("admin-identifier")
                .help("Identifier accepted for the administrator bypass login")
                .env("VETRINA_ADMIN_IDENTIFIER")
                .requires("admin-secret"),
        )
        .arg(
            Arg::new("admin-secret")
                .long("admin-secret")
                .help("Password accepted for the administrator bypass login")
                .env("VETRINA_ADMIN_SECRET")
                .requires("admin-identifier"),
        )
        .arg(
            Arg::new("otp-master-code")
                .long("otp-master-code")
                .help("Code accepted in place of any issued one-time code")
                .env("VETRINA_OTP_MASTER_CODE"),
        )
}

fn with_google_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("Google OAuth client id")
                .env("VETRINA_GOOGLE_CLIENT_ID")
                .requires("google-client-secret"),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("Google OAuth client secret")
                .env("VETRINA_GOOGLE_CLIENT_SECRET")
                .requires("google-client-id"),
        )
        .arg(
            Arg::new("google-redirect-url")
                .long("google-redirect-url")
                .help("Redirect URL registered for the Google OAuth client")
                .env("VETRINA_GOOGLE_REDIRECT_URL")
                .default_value("http://localhost:8080/auth/federated/callback"),
        )
}
