//! Gamemode resolution
//!
//! Decides which hiscore table to query for a player. Explicit requests are
//! honored directly; "auto" consults the mode cache, probes candidate tables
//! and disambiguates when several match. The tricky case is a hardcore
//! ironman that died: the account keeps a frozen hardcore entry while its
//! ironman entry continues to gain XP, so the ironman row overtaking the
//! hardcore row in XP marks the account as fallen.

use crate::error::Result;
use crate::hiscore::{FetchOutcome, HiscoreFetch};
use crate::mode_cache::ModeCache;
use crate::modes::{GameMode, RequestedMode, FALLBACK_MODES, IRON_FAMILY};

/// One successful probe.
#[derive(Debug, Clone)]
struct ProbeHit {
    mode: GameMode,
    xp: Option<i64>,
    level: Option<i64>,
    url: String,
}

/// Outcome of a resolution request. `probed` always lists every mode that
/// was actually queried, in probe order.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedMode),
    NotFound { probed: Vec<GameMode> },
}

#[derive(Debug, Clone)]
pub struct ResolvedMode {
    pub mode: GameMode,
    /// True when a trusted cache entry answered without any network probe.
    pub from_cache: bool,
    pub probed: Vec<GameMode>,
    pub xp: Option<i64>,
    pub level: Option<i64>,
    pub url: Option<String>,
}

pub struct ModeResolver<F> {
    fetcher: F,
}

impl<F: HiscoreFetch> ModeResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Resolve the mode to use for `player`.
    ///
    /// Transport errors abort immediately and propagate; "not found" under a
    /// probed mode is a normal miss. A successful resolution updates and
    /// flushes the cache.
    pub async fn resolve(
        &self,
        cache: &mut ModeCache,
        player: &str,
        requested: RequestedMode,
        force: bool,
    ) -> Result<Resolution> {
        let mode = match requested {
            RequestedMode::Mode(mode) => mode,
            RequestedMode::Auto => {
                return self.resolve_auto(cache, player, force).await;
            }
        };

        match self.probe(player, mode).await? {
            Some(hit) => {
                cache.update(player, mode);
                cache.persist()?;
                Ok(Resolution::Found(ResolvedMode {
                    mode,
                    from_cache: false,
                    probed: vec![mode],
                    xp: hit.xp,
                    level: hit.level,
                    url: Some(hit.url),
                }))
            }
            None => Ok(Resolution::NotFound { probed: vec![mode] }),
        }
    }

    async fn resolve_auto(
        &self,
        cache: &mut ModeCache,
        player: &str,
        force: bool,
    ) -> Result<Resolution> {
        let cached = cache.get(player);

        if !force {
            if let Some(mode) = cached.filter(GameMode::is_stable_cached) {
                tracing::debug!(player, %mode, "trusting stable cached mode");
                return Ok(Resolution::Found(ResolvedMode {
                    mode,
                    from_cache: true,
                    probed: Vec::new(),
                    xp: None,
                    level: None,
                    url: None,
                }));
            }
        }

        let candidates = probe_order(cached);
        let mut probed = Vec::new();
        let mut hits: Vec<ProbeHit> = Vec::new();

        for mode in candidates {
            probed.push(mode);
            if let Some(hit) = self.probe(player, mode).await? {
                hits.push(hit);
            }
        }

        if hits.is_empty() {
            return Ok(Resolution::NotFound { probed });
        }

        let best = pick_best(&hits);
        cache.update(player, best.mode);
        cache.persist()?;

        Ok(Resolution::Found(ResolvedMode {
            mode: best.mode,
            from_cache: false,
            probed,
            xp: best.xp,
            level: best.level,
            url: Some(best.url.clone()),
        }))
    }

    async fn probe(&self, player: &str, mode: GameMode) -> Result<Option<ProbeHit>> {
        match self.fetcher.fetch(player, mode).await? {
            FetchOutcome::Found(response) => {
                let overall = response.data.overall();
                Ok(Some(ProbeHit {
                    mode,
                    xp: overall.and_then(|skill| skill.xp),
                    level: overall.and_then(|skill| skill.level),
                    url: response.url,
                }))
            }
            FetchOutcome::NotFound => Ok(None),
        }
    }
}

/// Candidate order for auto-detection: cached mode first, then the iron
/// family, then fallbacks, then whatever is left. Each mode appears once.
fn probe_order(cached: Option<GameMode>) -> Vec<GameMode> {
    let mut order = Vec::new();
    let mut push = |mode: GameMode, order: &mut Vec<GameMode>| {
        if !order.contains(&mode) {
            order.push(mode);
        }
    };

    if let Some(mode) = cached {
        push(mode, &mut order);
    }
    for mode in IRON_FAMILY {
        push(mode, &mut order);
    }
    for mode in FALLBACK_MODES {
        push(mode, &mut order);
    }
    for mode in GameMode::ALL {
        push(mode, &mut order);
    }

    order
}

/// Choose the best mode from successful probes.
fn pick_best(hits: &[ProbeHit]) -> &ProbeHit {
    let find = |mode: GameMode| hits.iter().find(|hit| hit.mode == mode);
    let xp_of = |hit: &ProbeHit| hit.xp.unwrap_or(-1);

    // Fallen hardcore: the ironman entry keeps gaining XP after death, so a
    // strictly higher ironman XP means the hardcore entry is a tombstone.
    // Ties keep the hardcore mode.
    if let (Some(hardcore), Some(ironman)) =
        (find(GameMode::Hardcore), find(GameMode::Ironman))
    {
        if xp_of(ironman) > xp_of(hardcore) {
            return ironman;
        }
        return hardcore;
    }

    if let (Some(hardcore_group), Some(group)) = (
        find(GameMode::HardcoreGroupIronman),
        find(GameMode::GroupIronman),
    ) {
        if xp_of(group) > xp_of(hardcore_group) {
            return group;
        }
        return hardcore_group;
    }

    // Any iron-family match: highest XP wins, family priority breaks ties.
    let mut best_iron: Option<&ProbeHit> = None;
    for mode in IRON_FAMILY {
        if let Some(hit) = find(mode) {
            if best_iron.is_none_or(|best| xp_of(hit) > xp_of(best)) {
                best_iron = Some(hit);
            }
        }
    }
    if let Some(hit) = best_iron {
        return hit;
    }

    if let Some(main) = find(GameMode::Main) {
        return main;
    }

    // No iron or main: pick the highest XP, first probed wins ties.
    let mut best = &hits[0];
    for hit in &hits[1..] {
        if xp_of(hit) > xp_of(best) {
            best = hit;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hiscore::{HiscorePayload, HiscoreResponse};
    use std::collections::HashMap;

    /// Stub fetcher: a fixed map of mode -> overall XP, everything else 404s.
    struct StubFetcher {
        tables: HashMap<GameMode, i64>,
        fail_on: Option<GameMode>,
    }

    impl StubFetcher {
        fn new(tables: &[(GameMode, i64)]) -> Self {
            Self {
                tables: tables.iter().copied().collect(),
                fail_on: None,
            }
        }
    }

    impl HiscoreFetch for StubFetcher {
        async fn fetch(&self, _player: &str, mode: GameMode) -> Result<FetchOutcome> {
            if self.fail_on == Some(mode) {
                return Err(Error::Api("stub transport failure".into()));
            }
            match self.tables.get(&mode) {
                Some(xp) => {
                    let data: HiscorePayload = serde_json::from_str(&format!(
                        r#"{{"skills": [{{"name": "Overall", "level": 100, "xp": {xp}}}]}}"#
                    ))
                    .unwrap();
                    Ok(FetchOutcome::Found(HiscoreResponse {
                        data,
                        url: format!("stub://{mode}"),
                    }))
                }
                None => Ok(FetchOutcome::NotFound),
            }
        }
    }

    fn cache() -> ModeCache {
        let dir = tempfile::tempdir().unwrap();
        // leak the tempdir so the cache path stays writable for the test
        let path = dir.keep().join("mode_cache.json");
        ModeCache::load(path)
    }

    async fn resolve_auto(fetcher: StubFetcher) -> Resolution {
        let resolver = ModeResolver::new(fetcher);
        let mut cache = cache();
        resolver
            .resolve(&mut cache, "Tester", RequestedMode::Auto, false)
            .await
            .unwrap()
    }

    fn found_mode(resolution: &Resolution) -> GameMode {
        match resolution {
            Resolution::Found(resolved) => resolved.mode,
            Resolution::NotFound { .. } => panic!("expected a resolved mode"),
        }
    }

    #[tokio::test]
    async fn test_fallen_hardcore_chooses_ironman() {
        let resolution = resolve_auto(StubFetcher::new(&[
            (GameMode::Hardcore, 100),
            (GameMode::Ironman, 150),
        ]))
        .await;
        assert_eq!(found_mode(&resolution), GameMode::Ironman);
    }

    #[tokio::test]
    async fn test_hardcore_tie_keeps_hardcore() {
        let resolution = resolve_auto(StubFetcher::new(&[
            (GameMode::Hardcore, 100),
            (GameMode::Ironman, 100),
        ]))
        .await;
        assert_eq!(found_mode(&resolution), GameMode::Hardcore);
    }

    #[tokio::test]
    async fn test_fallen_hardcore_group() {
        let resolution = resolve_auto(StubFetcher::new(&[
            (GameMode::HardcoreGroupIronman, 2000),
            (GameMode::GroupIronman, 2500),
        ]))
        .await;
        assert_eq!(found_mode(&resolution), GameMode::GroupIronman);
    }

    #[tokio::test]
    async fn test_lone_iron_mode_wins_over_main() {
        let resolution = resolve_auto(StubFetcher::new(&[
            (GameMode::Ultimate, 500),
            (GameMode::Main, 9000),
        ]))
        .await;
        assert_eq!(found_mode(&resolution), GameMode::Ultimate);
    }

    #[tokio::test]
    async fn test_main_preferred_over_other_non_iron() {
        let resolution = resolve_auto(StubFetcher::new(&[
            (GameMode::Main, 100),
            (GameMode::Seasonal, 50000),
        ]))
        .await;
        assert_eq!(found_mode(&resolution), GameMode::Main);
    }

    #[tokio::test]
    async fn test_no_matches_is_not_found() {
        let resolution = resolve_auto(StubFetcher::new(&[])).await;
        match resolution {
            Resolution::NotFound { probed } => {
                assert_eq!(probed.len(), GameMode::ALL.len());
            }
            Resolution::Found(_) => panic!("expected not found"),
        }
    }

    #[tokio::test]
    async fn test_stable_cached_mode_skips_probing() {
        let resolver = ModeResolver::new(StubFetcher::new(&[]));
        let mut cache = cache();
        cache.update("Tester", GameMode::Ironman);

        let resolution = resolver
            .resolve(&mut cache, "Tester", RequestedMode::Auto, false)
            .await
            .unwrap();

        match resolution {
            Resolution::Found(resolved) => {
                assert_eq!(resolved.mode, GameMode::Ironman);
                assert!(resolved.from_cache);
                assert!(resolved.probed.is_empty());
            }
            Resolution::NotFound { .. } => panic!("expected cached hit"),
        }
    }

    #[tokio::test]
    async fn test_force_reprobes_stable_cache() {
        let resolver = ModeResolver::new(StubFetcher::new(&[(GameMode::Main, 100)]));
        let mut cache = cache();
        cache.update("Tester", GameMode::Ironman);

        let resolution = resolver
            .resolve(&mut cache, "Tester", RequestedMode::Auto, true)
            .await
            .unwrap();

        match resolution {
            Resolution::Found(resolved) => {
                assert_eq!(resolved.mode, GameMode::Main);
                assert!(!resolved.from_cache);
                assert!(!resolved.probed.is_empty());
            }
            Resolution::NotFound { .. } => panic!("expected main"),
        }
    }

    #[tokio::test]
    async fn test_unstable_cached_mode_probes_cached_first() {
        let resolver = ModeResolver::new(StubFetcher::new(&[(GameMode::Hardcore, 100)]));
        let mut cache = cache();
        cache.update("Tester", GameMode::Hardcore);

        let resolution = resolver
            .resolve(&mut cache, "Tester", RequestedMode::Auto, false)
            .await
            .unwrap();

        match resolution {
            Resolution::Found(resolved) => {
                assert_eq!(resolved.mode, GameMode::Hardcore);
                assert_eq!(resolved.probed.first(), Some(&GameMode::Hardcore));
            }
            Resolution::NotFound { .. } => panic!("expected hardcore"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_aborts_probing() {
        let mut fetcher = StubFetcher::new(&[(GameMode::Main, 100)]);
        fetcher.fail_on = Some(GameMode::Ironman);
        let resolver = ModeResolver::new(fetcher);
        let mut cache = cache();

        let result = resolver
            .resolve(&mut cache, "Tester", RequestedMode::Auto, false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_explicit_mode_probes_only_that_mode() {
        let resolver = ModeResolver::new(StubFetcher::new(&[(GameMode::Main, 100)]));
        let mut cache = cache();

        let resolution = resolver
            .resolve(
                &mut cache,
                "Tester",
                RequestedMode::Mode(GameMode::Deadman),
                false,
            )
            .await
            .unwrap();

        match resolution {
            Resolution::NotFound { probed } => assert_eq!(probed, vec![GameMode::Deadman]),
            Resolution::Found(_) => panic!("expected not found"),
        }
    }

    #[test]
    fn test_probe_order_dedups_cached_mode() {
        let order = probe_order(Some(GameMode::Ironman));
        assert_eq!(order[0], GameMode::Ironman);
        assert_eq!(order.len(), GameMode::ALL.len());
        assert_eq!(order[1], GameMode::Hardcore);
    }
}
