// Composes the router and resolver according to the configured mode

use crate::config::Mode;
use crate::models::intent::{RawIntent, StructuredIntent};
use crate::orchestrator::Resolver;
use crate::router::{DirectRouter, RouterOutcome, UNRECOGNIZED_MESSAGE};

#[derive(Clone)]
pub struct QueryService {
    router: Option<DirectRouter>,
    resolver: Option<Resolver>,
}

impl QueryService {
    pub fn new(router: Option<DirectRouter>, resolver: Option<Resolver>) -> Self {
        Self { router, resolver }
    }

    pub fn mode(&self) -> Mode {
        match (&self.router, &self.resolver) {
            (Some(_), Some(_)) => Mode::Hybrid,
            (None, Some(_)) => Mode::Translator,
            _ => Mode::Direct,
        }
    }

    /// Answers a natural-language query. The router short-circuits shapes it
    /// recognizes; everything else goes to the resolver when there is one.
    pub async fn answer(&self, query: &str) -> String {
        if let Some(router) = &self.router {
            let outcome = router.route_query(query).await;
            if outcome.is_recognized() || self.resolver.is_none() {
                log::info!("service: answered directly ({outcome:?})");
                return outcome.message();
            }
            log::debug!("service: router passed on {query:?} ({outcome:?})");
        }

        match &self.resolver {
            Some(resolver) => {
                let resolution = resolver.resolve(query).await;
                log::info!(
                    "service: resolver finished {:?} after {} attempt(s)",
                    resolution.outcome,
                    resolution.attempts
                );
                resolution.answer
            }
            None => UNRECOGNIZED_MESSAGE.to_string(),
        }
    }

    /// Dispatches a loosely specified intent through the router. `None` when
    /// this service runs without one (translator mode).
    pub async fn answer_intent(&self, raw: &RawIntent) -> Option<String> {
        let router = self.router.as_ref()?;
        Some(match StructuredIntent::from_raw(raw) {
            Some(intent) => router.dispatch(&intent).await.message(),
            None => RouterOutcome::Unrecognized.message(),
        })
    }
}
