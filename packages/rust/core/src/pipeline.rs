//! End-to-end research pipeline: search, scrape, extract, score,
//! summarize, person research, persist.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, instrument, warn};
use url::Url;

use prospector_analysis::{
    AnthropicProvider, LlmClient, LlmRequest, OpenAiProvider, compute_fit_score,
    extract_company_intelligence, generate_company_summary,
};
use prospector_scrape::{DirectFetchProvider, ReaderProvider, ScrapeStage};
use prospector_search::{
    FreeSearchClient, PrimarySearchClient, SearchRequest, SearchResponse, SearchStage,
    guess_domain,
};
use prospector_shared::{
    AppConfig, CompanyInput, CompanyResult, FallbackChain, Governor, PersonProfile,
    ProspectorError, Result, RunOptions, RunStatus, ScrapedPage, ServiceClass, read_api_key,
    validate_llm_keys,
};
use prospector_storage::{CacheSession, Namespace, Storage, company_key};

use crate::enrichment::CrmEnricher;
use crate::progress::ProgressReporter;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Async research pipeline with per-service concurrency control. One
/// instance serves a whole batch; provider health and in-flight cache
/// locks are shared across its companies.
pub struct ResearchPipeline {
    pub(crate) config: AppConfig,
    pub(crate) options: RunOptions,
    pub(crate) storage: Arc<Storage>,
    pub(crate) cache: Arc<CacheSession>,
    pub(crate) governor: Arc<Governor>,
    pub(crate) search: SearchStage,
    pub(crate) scrape: ScrapeStage,
    pub(crate) llm: LlmClient,
    pub(crate) crm: Box<dyn CrmEnricher>,
}

impl ResearchPipeline {
    /// Wire the pipeline from config, reading provider keys from the
    /// environment. Fails fast when no LLM key is available.
    pub fn new(
        config: AppConfig,
        options: RunOptions,
        storage: Arc<Storage>,
        crm: Box<dyn CrmEnricher>,
    ) -> Result<Self> {
        validate_llm_keys(&config)?;

        let cache = Arc::new(CacheSession::new(storage.clone(), options.force_refresh));
        let governor = Arc::new(Governor::new(&config.limits));

        let mut search_chain: FallbackChain<SearchRequest, SearchResponse> =
            FallbackChain::new("search");
        if let Some(key) = read_api_key(&config.search.api_key_env) {
            search_chain = search_chain.with(Box::new(PrimarySearchClient::new(
                key,
                SEARCH_TIMEOUT,
            )?));
        }
        search_chain = search_chain.with(Box::new(FreeSearchClient::new(
            Duration::from_millis(config.search.free_min_interval_ms),
            SEARCH_TIMEOUT,
        )?));

        let scrape_timeout = Duration::from_secs(config.scrape.timeout_secs);
        let scrape_chain = FallbackChain::new("scrape")
            .with(Box::new(DirectFetchProvider::new(
                scrape_timeout,
                config.scrape.max_attempts,
            )?))
            .with(Box::new(ReaderProvider::new(scrape_timeout)?));

        let llm_timeout = Duration::from_secs(config.llm.timeout_secs);
        let mut llm_chain: FallbackChain<LlmRequest, String> = FallbackChain::new("llm");
        if let Some(key) = read_api_key(&config.llm.anthropic_api_key_env) {
            llm_chain = llm_chain.with(Box::new(AnthropicProvider::new(
                key,
                config.llm.anthropic_model.clone(),
                llm_timeout,
            )));
        }
        if let Some(key) = read_api_key(&config.llm.openai_api_key_env) {
            llm_chain = llm_chain.with(Box::new(OpenAiProvider::new(
                key,
                config.llm.openai_model.clone(),
                llm_timeout,
            )));
        }

        Ok(Self::with_stages(
            config,
            options,
            storage,
            cache,
            governor,
            search_chain,
            scrape_chain,
            llm_chain,
            crm,
        ))
    }

    /// Assemble from pre-built provider chains. Tests point these at
    /// mock servers.
    #[allow(clippy::too_many_arguments)]
    pub fn with_stages(
        config: AppConfig,
        options: RunOptions,
        storage: Arc<Storage>,
        cache: Arc<CacheSession>,
        governor: Arc<Governor>,
        search_chain: FallbackChain<SearchRequest, SearchResponse>,
        scrape_chain: FallbackChain<prospector_scrape::ScrapeRequest, prospector_scrape::ScrapeResponse>,
        llm_chain: FallbackChain<LlmRequest, String>,
        crm: Box<dyn CrmEnricher>,
    ) -> Self {
        let cache_ttl = Duration::from_secs(u64::from(config.cache.cache_ttl_days) * 86_400);
        let search = SearchStage::new(
            search_chain,
            cache.clone(),
            governor.clone(),
            config.search.clone(),
            cache_ttl,
        );
        let scrape = ScrapeStage::new(
            scrape_chain,
            cache.clone(),
            governor.clone(),
            config.scrape.clone(),
            cache_ttl,
        );
        let llm = LlmClient::new(llm_chain, governor.clone());

        Self {
            config,
            options,
            storage,
            cache,
            governor,
            search,
            scrape,
            llm,
            crm,
        }
    }

    pub(crate) fn repository_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.cache.repository_ttl_days) * 86_400)
    }

    /// Process a batch of companies with bounded concurrency. Output
    /// preserves input order; a failed company occupies its slot as an
    /// error result instead of failing the batch.
    pub async fn run(
        &self,
        companies: &[CompanyInput],
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<CompanyResult>> {
        let selected: Vec<&CompanyInput> = companies
            .iter()
            .filter(|c| self.options.allows(&c.company_name))
            .take(self.options.max_companies.unwrap_or(usize::MAX))
            .collect();

        if selected.is_empty() {
            return Err(ProspectorError::validation(
                "no companies to process after applying filters",
            ));
        }

        info!(
            total = selected.len(),
            force_refresh = self.options.force_refresh,
            "starting research batch"
        );

        let results = join_all(
            selected
                .iter()
                .map(|company| self.process_company_safe(company, progress)),
        )
        .await;

        let succeeded = results.iter().filter(|r| r.error.is_none()).count();
        info!(succeeded, total = results.len(), "research batch complete");
        Ok(results)
    }

    /// One company end to end, under the company-level permit, with all
    /// failures converted into an error result.
    async fn process_company_safe(
        &self,
        company: &CompanyInput,
        progress: &dyn ProgressReporter,
    ) -> CompanyResult {
        let _permit = self.governor.acquire(ServiceClass::Company).await;
        let name = company.company_name.clone();

        let run_id = match self.storage.insert_run(&name).await {
            Ok(id) => id,
            Err(e) => {
                warn!(company = %name, error = %e, "could not create run record");
                return CompanyResult::error_result(&name, e.to_string());
            }
        };

        match self.process_company(&run_id, company, progress).await {
            Ok(result) => {
                self.finalize(&run_id, &result).await;
                progress.company_done(&result);
                result
            }
            Err(e) => {
                warn!(company = %name, error = %e, "company research failed");
                if let Err(db_err) = self
                    .storage
                    .complete_run(&run_id, RunStatus::Failed.as_str(), None)
                    .await
                {
                    warn!(company = %name, error = %db_err, "could not mark run failed");
                }
                let result = CompanyResult::error_result(&name, e.to_string());
                progress.company_done(&result);
                result
            }
        }
    }

    #[instrument(skip_all, fields(company = %company.company_name, run_id = %run_id))]
    async fn process_company(
        &self,
        run_id: &str,
        company: &CompanyInput,
        progress: &dyn ProgressReporter,
    ) -> Result<CompanyResult> {
        let name = &company.company_name;
        let search_name = company.search_name();

        if let Some(mut cached) = self.load_cached_company(name).await {
            info!("serving from repository cache");
            cached.from_cache = true;
            cached.fit_score = Some(compute_fit_score(&cached.intelligence));
            self.refresh_crm(name, company, &mut cached.person_profiles)
                .await;
            return Ok(cached);
        }

        let mut degraded = false;

        // Search
        self.report(run_id, name, RunStatus::Searching, 10, &format!("Searching for {name}"), progress)
            .await;
        let search_outcome = self.search.search_company(search_name).await;
        degraded |= search_outcome.degraded;

        // Scrape
        self.report(
            run_id,
            name,
            RunStatus::Scraping,
            25,
            &format!("Scraping {} URLs", search_outcome.urls.len()),
            progress,
        )
        .await;
        let pages = self
            .scrape
            .scrape_urls(&search_outcome.urls, search_name, &search_outcome.inline_content)
            .await;
        let good_pages: Vec<ScrapedPage> =
            pages.into_iter().filter(|p| p.has_content()).collect();
        degraded |= good_pages.len() < search_outcome.urls.len();
        let total_content: usize = good_pages.iter().map(|p| p.content.len()).sum();

        // Extract
        self.report(run_id, name, RunStatus::Extracting, 40, "Extracting intelligence", progress)
            .await;
        let intelligence = match extract_company_intelligence(&self.llm, name, &good_pages).await {
            Ok(intel) => intel,
            Err(e) => {
                warn!(error = %e, "extraction failed");
                degraded = true;
                Default::default()
            }
        };

        // Score. Always recomputed, never cached.
        self.report(run_id, name, RunStatus::Scoring, 55, "Computing fit score", progress)
            .await;
        let fit_score = compute_fit_score(&intelligence);

        // Summarize. Empty intelligence has nothing worth narrating.
        self.report(run_id, name, RunStatus::Summarizing, 60, "Generating summary", progress)
            .await;
        let summary = if intelligence.is_empty() {
            None
        } else {
            match generate_company_summary(&self.llm, name, &intelligence).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(error = %e, "summary generation failed");
                    degraded = true;
                    None
                }
            }
        };

        // People
        self.report(
            run_id,
            name,
            RunStatus::PersonResearch,
            70,
            &format!("Researching {} people", company.all_people().len()),
            progress,
        )
        .await;
        let domain =
            company_domain(intelligence.company_overview.website_url.as_deref(), search_name);
        let (person_profiles, people_degraded) = self.research_people(company, &domain).await;
        degraded |= people_degraded;

        self.report(run_id, name, RunStatus::PersonResearch, 95, "Assembling result", progress)
            .await;

        let insufficient_data =
            total_content < self.config.scrape.min_content_chars || intelligence.is_empty();
        let source_urls: Vec<String> = good_pages.iter().map(|p| p.url.clone()).collect();

        let result = CompanyResult {
            company_name: name.clone(),
            intelligence,
            summary,
            fit_score: Some(fit_score),
            person_profiles,
            source_urls,
            processed_at: chrono::Utc::now(),
            from_cache: false,
            degraded,
            insufficient_data,
            error: None,
        };

        self.cache_company_result(&result).await;
        Ok(result)
    }

    /// Load and validate a cached company result. Cached entries with
    /// empty intelligence came from failed extractions and are treated
    /// as misses so the company gets re-processed.
    async fn load_cached_company(&self, name: &str) -> Option<CompanyResult> {
        let key = company_key(name);
        let payload = match self.cache.get(Namespace::Company, &key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "company cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CompanyResult>(&payload) {
            Ok(result) if !result.intelligence.is_empty() => Some(result),
            Ok(_) => {
                info!("cached result has empty intelligence, re-processing");
                None
            }
            Err(e) => {
                warn!(error = %e, "cached result did not parse, re-processing");
                None
            }
        }
    }

    /// Cache a successful result, stripping volatile CRM fields first.
    async fn cache_company_result(&self, result: &CompanyResult) {
        if result.intelligence.is_empty() {
            return;
        }
        let mut cacheable = result.clone();
        cacheable.from_cache = false;
        cacheable.person_profiles = cacheable
            .person_profiles
            .into_iter()
            .map(|p| p.without_crm())
            .collect();

        let Ok(payload) = serde_json::to_string(&cacheable) else {
            return;
        };
        let key = company_key(&result.company_name);
        if let Err(e) = self
            .cache
            .put(Namespace::Company, &key, &payload, self.repository_ttl())
            .await
        {
            warn!(error = %e, "company cache write failed");
        }
    }

    /// Persist the run outcome: terminal run state, result row, and
    /// prospect directory upserts.
    async fn finalize(&self, run_id: &str, result: &CompanyResult) {
        let result_json = serde_json::to_string(result).ok();
        if let Err(e) = self
            .storage
            .complete_run(run_id, RunStatus::Done.as_str(), result_json.as_deref())
            .await
        {
            warn!(error = %e, "could not complete run record");
        }

        let intelligence_json =
            serde_json::to_string(&result.intelligence).unwrap_or_else(|_| "{}".into());
        let profiles_json =
            serde_json::to_string(&result.person_profiles).unwrap_or_else(|_| "[]".into());
        let source_urls_json =
            serde_json::to_string(&result.source_urls).unwrap_or_else(|_| "[]".into());
        if let Err(e) = self
            .storage
            .insert_result(
                run_id,
                &result.company_name,
                result.fit_score.map(|f| f.total),
                result.fit_score.map(|f| f.rating.to_string()).as_deref(),
                &intelligence_json,
                &profiles_json,
                &source_urls_json,
            )
            .await
        {
            warn!(error = %e, "could not persist result row");
        }

        for profile in &result.person_profiles {
            if let Err(e) = self
                .storage
                .upsert_prospect(
                    &result.company_name,
                    &profile.name,
                    profile.email.as_deref(),
                    profile.linkedin_url.as_deref(),
                    "research",
                )
                .await
            {
                warn!(person = %profile.name, error = %e, "could not upsert prospect");
            }
        }
    }

    /// Re-attach CRM data to profiles served from cache.
    async fn refresh_crm(
        &self,
        company_name: &str,
        company: &CompanyInput,
        profiles: &mut [PersonProfile],
    ) {
        if !self.crm.is_configured() {
            return;
        }
        for profile in profiles.iter_mut() {
            if profile.email.is_none() {
                profile.email = company
                    .contacts
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&profile.name))
                    .and_then(|c| c.email.clone());
            }
            if let Err(e) = self.crm.enrich(company_name, profile).await {
                warn!(person = %profile.name, error = %e, "CRM enrichment failed");
            }
        }
    }

    async fn report(
        &self,
        run_id: &str,
        company: &str,
        status: RunStatus,
        pct: u32,
        msg: &str,
        progress: &dyn ProgressReporter,
    ) {
        progress.phase(company, status, pct, msg);
        if let Err(e) = self
            .storage
            .update_run_progress(run_id, status.as_str(), pct, msg)
            .await
        {
            warn!(error = %e, "could not update run progress");
        }
    }
}

/// Domain from the extracted website URL, else guessed from the name.
pub(crate) fn company_domain(website_url: Option<&str>, search_name: &str) -> String {
    if let Some(raw) = website_url {
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        if let Ok(url) = Url::parse(&candidate) {
            if let Some(host) = url.host_str() {
                return host.trim_start_matches("www.").to_string();
            }
        }
    }
    guess_domain(search_name)
}
