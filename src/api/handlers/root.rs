//! Plain-text service banner.

pub async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::root;

    #[tokio::test]
    async fn banner_names_the_service() {
        let banner = root().await;
        assert!(banner.starts_with(env!("CARGO_PKG_NAME")));
    }
}
