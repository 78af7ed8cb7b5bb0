use std::future::Future;
use std::pin::Pin;

use domain::common::error::MonitorError;
use domain::registry::entity::DomainEntry;

/// Secondary port for the remote domain list API.
///
/// One fetch returns the complete monitored set; the reconciler computes
/// deltas against the registry. Unparseable individual entries are skipped
/// by implementations (partial success), a transport or payload failure for
/// the whole fetch is an error.
pub trait DomainListSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEntry>, MonitorError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptySource;

    impl DomainListSource for EmptySource {
        fn fetch<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEntry>, MonitorError>> + Send + 'a>>
        {
            Box::pin(async { Ok(vec![]) })
        }
    }

    #[tokio::test]
    async fn source_is_dyn_compatible() {
        let source: Box<dyn DomainListSource> = Box::new(EmptySource);
        assert!(source.fetch().await.unwrap().is_empty());
    }
}
