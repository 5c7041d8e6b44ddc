//! Ordered sync flows.
//!
//! Each public method is one flow. A step that fails halts the flow and its
//! error is returned unchanged; nothing is retried. Every response is merged
//! in exactly one store transaction, after the network call has returned.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::{self, MessageMerge, ProfileMerge, SettingsMerge};
use crate::state::{SyncState, SyncStats, Tracker};
use crate::transport::Transport;
use reachme_protocol::{
    ApiRequest, CarrierListResponse, Command, FetchMessagesResponse, JoinAction,
    JoinUserResponse, LoginResponse, ProfileInfoResponse, RequestContext, ResponseBody,
    SettingsResponse, SimInfo,
};
use reachme_store::{keys, ProfileStore, SettingsStore};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which client state a message fetch runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// The app is in the foreground.
    #[default]
    Foreground,
    /// Triggered by a push or background refresh.
    Background,
}

/// Runs sync flows against one profile store.
pub struct SyncCoordinator<T: Transport> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<ProfileStore>,
    settings: Arc<dyn SettingsStore>,
    fetch_lock: Mutex<()>,
    tracker: Tracker,
}

impl<T: Transport> SyncCoordinator<T> {
    /// Creates a coordinator.
    pub fn new(
        config: SyncConfig,
        transport: T,
        store: Arc<ProfileStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            store,
            settings,
            fetch_lock: Mutex::new(()),
            tracker: Tracker::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the profile store.
    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// Returns the settings store.
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        self.tracker.state()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.tracker.stats()
    }

    /// Returns the message watermark a fetch would request after.
    ///
    /// This is the larger of the committed watermark and its mirror in the
    /// settings store, or 0 when neither is set.
    pub fn watermark(&self) -> i64 {
        let mirrored = self
            .settings
            .get_i64(keys::FETCH_AFTER_MSGS_ID)
            .unwrap_or(0);
        self.store.watermark().max(mirrored)
    }

    /// Registers a phone number.
    ///
    /// A provisional profile carrying the SIM details is created first. If
    /// the call fails, a profile created here is deleted again.
    pub async fn join_user(&self, phone: &str, sim: &SimInfo) -> SyncResult<JoinAction> {
        self.track(SyncState::Authenticating, self.join_user_flow(phone, sim))
            .await
    }

    /// Signs in with a password, then fetches the profile and settings.
    pub async fn sign_in(&self, password: &str) -> SyncResult<()> {
        self.track(SyncState::Authenticating, async {
            let login_id = self.login_id()?;
            let request = ApiRequest::sign_in(
                &login_id,
                password,
                &self.config.context.device_id,
                &self.sim(),
            );
            self.login_step(request, Some(&login_id)).await?;
            self.fetch_profile_step().await?;
            self.fetch_settings_step().await?;
            Ok(())
        })
        .await
    }

    /// Verifies the PIN sent after `join_user`, then fetches the profile and
    /// settings.
    pub async fn verify_otp(&self, pin: &str) -> SyncResult<()> {
        self.track(SyncState::Authenticating, async {
            let login_id = self.login_id()?;
            let reg_secure_key = self
                .settings
                .get(keys::REG_SECURE_KEY)
                .ok_or(SyncError::NotSignedIn)?;
            let cloud_secure_key = self.settings.get(keys::CLOUD_SECURE_KEY);
            let request =
                ApiRequest::verify_user(&reg_secure_key, pin, cloud_secure_key.as_deref());
            self.login_step(request, Some(&login_id)).await?;
            self.fetch_profile_step().await?;
            self.fetch_settings_step().await?;
            Ok(())
        })
        .await
    }

    /// Verifies a generated password. Only the login part is merged.
    pub async fn verify_password(&self, pin: &str) -> SyncResult<()> {
        self.track(SyncState::Authenticating, async {
            let login_id = self.login_id()?;
            let request =
                ApiRequest::verify_password(&login_id, pin, &self.config.context.device_id);
            self.login_step(request, None).await?;
            Ok(())
        })
        .await
    }

    /// Fetches and merges the profile.
    ///
    /// When the primary contact has no candidate carriers yet, its carrier
    /// list is fetched too. That fetch failing is logged and does not fail
    /// the profile step.
    pub async fn fetch_profile(&self) -> SyncResult<ProfileMerge> {
        self.track(SyncState::Fetching, self.fetch_profile_step())
            .await
    }

    /// Fetches and merges settings, support contacts and voicemail info.
    pub async fn fetch_settings(&self) -> SyncResult<SettingsMerge> {
        self.track(SyncState::Fetching, self.fetch_settings_step())
            .await
    }

    /// Fetches the carrier list for the country of `contact_id`.
    ///
    /// A contact without a country code is skipped and reports 0 carriers.
    pub async fn fetch_carriers(&self, contact_id: &str) -> SyncResult<usize> {
        self.track(SyncState::Fetching, self.fetch_carriers_step(contact_id))
            .await
    }

    /// Fetches messages after the watermark and merges them.
    ///
    /// Fetches are serialized, so two calls never request with the same
    /// cursor.
    pub async fn fetch_messages(&self, mode: FetchMode) -> SyncResult<MessageMerge> {
        let _guard = self.fetch_lock.lock().await;
        self.tracker.begin(SyncState::Fetching);
        let result = self.fetch_messages_step(mode).await;
        self.finish(&result, |merge| merge.inserted);
        result
    }

    /// Sends the local custom settings and social posting flags.
    pub async fn update_settings(&self) -> SyncResult<()> {
        self.track(SyncState::Updating, async {
            let (settings, fb_post, tw_post) = self
                .store
                .read(|state| {
                    state.profile.as_ref().map(|p| {
                        (
                            reconciler::collect_custom_settings(p),
                            p.fb_post_enabled,
                            p.tw_post_enabled,
                        )
                    })
                })
                .ok_or(SyncError::NotSignedIn)?;
            self.call(ApiRequest::update_settings(&settings, fb_post, tw_post))
                .await?;
            Ok(())
        })
        .await
    }

    /// Deletes a message on the server, then locally.
    ///
    /// Returns false without a request if the message is not stored.
    pub async fn delete_message(&self, message_id: i64) -> SyncResult<bool> {
        self.track(SyncState::Updating, async {
            let message_type = self.store.read(|state| {
                state
                    .profile
                    .as_ref()
                    .ok_or(SyncError::NotSignedIn)
                    .map(|p| {
                        p.messages
                            .get(&message_id)
                            .map(|m| m.message_type.clone().unwrap_or_default())
                    })
            })?;
            let Some(message_type) = message_type else {
                return Ok(false);
            };

            self.call(ApiRequest::delete_message(message_id, &message_type))
                .await?;
            self.store
                .transaction(|txn| reconciler::delete_message(txn, message_id))
        })
        .await
    }

    /// Marks messages read on the server, then locally.
    ///
    /// Ids that are not stored are left out. The ids type is the sender
    /// type of the first stored message. Returns the number marked.
    pub async fn read_messages(&self, message_ids: &[i64]) -> SyncResult<usize> {
        self.track(SyncState::Updating, async {
            let (found, ids_type) = self.store.read(|state| -> SyncResult<(Vec<i64>, String)> {
                let profile = state.profile.as_ref().ok_or(SyncError::NotSignedIn)?;
                let messages: Vec<_> = message_ids
                    .iter()
                    .filter_map(|id| profile.messages.get(id))
                    .collect();
                let ids_type = messages
                    .first()
                    .and_then(|m| m.from_user_type.clone())
                    .unwrap_or_default();
                Ok((messages.iter().map(|m| m.message_id).collect(), ids_type))
            })?;
            if found.is_empty() {
                return Ok(0);
            }

            self.call(ApiRequest::read_messages(&found, &ids_type))
                .await?;
            self.store
                .transaction(|txn| reconciler::mark_read(txn, &found))
        })
        .await
    }

    /// Registers push tokens and stores them once accepted.
    pub async fn set_device_info(
        &self,
        device_token: Option<&str>,
        voip_token: Option<&str>,
    ) -> SyncResult<()> {
        self.track(SyncState::Updating, async {
            self.call(ApiRequest::set_device_info(device_token, voip_token))
                .await?;
            if let Some(token) = device_token {
                self.settings.set(keys::CLOUD_SECURE_KEY, token)?;
            }
            if let Some(token) = voip_token {
                self.settings.set(keys::VOIP_CLOUD_SECURE_KEY, token)?;
            }
            Ok(())
        })
        .await
    }

    /// Signs out on the server, then drops the session keys and the local
    /// profile.
    pub async fn sign_out(&self) -> SyncResult<()> {
        let _guard = self.fetch_lock.lock().await;
        self.track(SyncState::Updating, async {
            self.call(ApiRequest::new(Command::SignOut)).await?;
            self.clear_session()?;
            self.store
                .transaction(|txn| Ok::<_, SyncError>(reconciler::delete_profile(txn)))?;
            tracing::info!("signed out");
            Ok(())
        })
        .await
    }

    /// Returns the raw usage summary for a line.
    pub async fn usage_summary(&self, phone: &str) -> SyncResult<Map<String, Value>> {
        self.track(SyncState::Fetching, async {
            let body = self.call(ApiRequest::usage_summary(phone)).await?;
            Ok(body.into_map())
        })
        .await
    }

    /// Changes the display name or email on the server, then locally.
    pub async fn update_profile_info(
        &self,
        screen_name: Option<&str>,
        email: Option<&str>,
    ) -> SyncResult<()> {
        self.track(SyncState::Updating, async {
            self.login_id()?;
            self.call(ApiRequest::update_profile_info(screen_name, email))
                .await?;
            self.store.transaction(|txn| {
                reconciler::update_profile_details(txn, screen_name, email)
            })
        })
        .await
    }

    /// Sends a secondary line change and returns the raw response.
    pub async fn manage_user_contact(
        &self,
        params: Map<String, Value>,
    ) -> SyncResult<Map<String, Value>> {
        self.track(SyncState::Updating, async {
            let body = self.call(ApiRequest::manage_user_contact(params)).await?;
            Ok(body.into_map())
        })
        .await
    }

    /// Sends a voicemail setting change.
    pub async fn voicemail_setting(&self, params: Map<String, Value>) -> SyncResult<()> {
        self.track(SyncState::Updating, async {
            self.call(ApiRequest::voicemail_setting(params)).await?;
            Ok(())
        })
        .await
    }

    /// Requests the user's phone lines.
    ///
    /// The response repeats what `fetch_profile` already merges, so it is
    /// not stored.
    pub async fn fetch_user_contacts(&self) -> SyncResult<()> {
        self.track(SyncState::Fetching, async {
            self.call(ApiRequest::fetch_user_contacts()).await?;
            Ok(())
        })
        .await
    }

    /// Asks the server to send a new password.
    pub async fn generate_password(&self) -> SyncResult<()> {
        self.track(SyncState::Authenticating, async {
            let login_id = self.login_id()?;
            self.call(ApiRequest::generate_password(&login_id)).await?;
            Ok(())
        })
        .await
    }

    /// Asks the server to deliver the verification code by voice call.
    pub async fn generate_verification_code(&self) -> SyncResult<()> {
        self.track(SyncState::Authenticating, async {
            let reg_secure_key = self.settings.get(keys::REG_SECURE_KEY);
            let request =
                ApiRequest::generate_verification_code(reg_secure_key.as_deref(), &self.sim());
            self.call(request).await?;
            Ok(())
        })
        .await
    }

    async fn join_user_flow(&self, phone: &str, sim: &SimInfo) -> SyncResult<JoinAction> {
        let (created, replaced) = self.store.transaction(|txn| {
            let existing = txn.profile().ok().map(|p| p.user_id != phone);
            let profile = txn.profile_or_create(phone);
            profile.country_iso_code = Some(sim.country_iso.clone());
            profile.sim_mcc_mnc = sim.mcc_mnc.clone();
            Ok::<_, SyncError>((existing != Some(false), existing == Some(true)))
        })?;
        if replaced {
            self.clear_session()?;
        }

        let request = ApiRequest::join_user(phone, &self.config.context.device_id, sim);
        let result = async {
            let body = self.call(request).await?;
            Ok::<_, SyncError>(JoinUserResponse::decode(&body)?)
        }
        .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if created {
                    self.discard_profile();
                }
                return Err(err);
            }
        };

        if let Some(key) = &response.reg_secure_key {
            self.settings.set(keys::REG_SECURE_KEY, key)?;
        }
        self.settings
            .set_value(keys::IS_RM_NEW_USER, &response.is_new_user)?;
        if let Some(app_id) = &response.pns_app_id {
            self.settings.set(keys::PNS_APP_ID, app_id)?;
        }
        if let Some(url) = &response.docs_url {
            self.settings.set(keys::DOCS_URL, url)?;
        }

        tracing::info!(
            action = ?response.action,
            new_user = response.is_new_user,
            "join_user accepted"
        );
        Ok(response.action)
    }

    async fn login_step(
        &self,
        request: ApiRequest,
        user_id: Option<&str>,
    ) -> SyncResult<LoginResponse> {
        let body = self.call(request).await?;
        let login = LoginResponse::decode(&body)?;
        self.store
            .transaction(|txn| reconciler::merge_login(txn, user_id, &login))?;
        reconciler::store_login_keys(self.settings.as_ref(), &login)?;
        tracing::info!(iv_user_id = login.iv_user_id, "login merged");
        Ok(login)
    }

    async fn fetch_profile_step(&self) -> SyncResult<ProfileMerge> {
        let body = self.call(ApiRequest::new(Command::GetProfileInfo)).await?;
        let response = ProfileInfoResponse::decode(&body)?;
        let outcome = self
            .store
            .transaction(|txn| reconciler::merge_profile(txn, &response))?;

        if outcome.primary_needs_carriers {
            if let Some(primary) = &outcome.primary_contact_id {
                if let Err(err) = self.fetch_carriers_step(primary).await {
                    tracing::warn!(
                        contact = %primary,
                        error = %err,
                        "carrier fetch for primary contact failed"
                    );
                }
            }
        }
        Ok(outcome)
    }

    async fn fetch_settings_step(&self) -> SyncResult<SettingsMerge> {
        let body = self.call(ApiRequest::fetch_settings()).await?;
        let response = SettingsResponse::decode(&body)?;
        let mode = self.config.contact_match;
        self.store
            .transaction(|txn| reconciler::merge_settings(txn, &response, mode))
    }

    async fn fetch_carriers_step(&self, contact_id: &str) -> SyncResult<usize> {
        let mode = self.config.contact_match;
        let country_code = self.store.read(|state| {
            let profile = state.profile.as_ref().ok_or(SyncError::NotSignedIn)?;
            profile
                .find_contact(contact_id, mode)
                .map(|c| c.country_code.clone())
                .ok_or_else(|| SyncError::UnknownContact(contact_id.to_string()))
        })?;
        let Some(country_code) = country_code else {
            tracing::warn!(contact = %contact_id, "contact has no country code; skipping carriers");
            return Ok(0);
        };

        let body = self
            .call(ApiRequest::list_carriers(&country_code))
            .await?;
        let response = CarrierListResponse::decode(&body)?;
        self.store
            .transaction(|txn| reconciler::merge_carriers(txn, contact_id, &response, mode))
    }

    async fn fetch_messages_step(&self, mode: FetchMode) -> SyncResult<MessageMerge> {
        if !self.store.read(|state| state.profile.is_some()) {
            return Err(SyncError::NotSignedIn);
        }

        let after = self.watermark();
        let request = match mode {
            FetchMode::Foreground => {
                ApiRequest::fetch_messages(after, self.config.foreground_page_size, false)
            }
            FetchMode::Background => {
                ApiRequest::fetch_messages(after, self.config.background_page_size, true)
            }
        };
        let body = self.call(request).await?;
        let response = FetchMessagesResponse::decode(&body)?;
        let outcome = self.store.transaction(|txn| {
            txn.advance_watermark(after);
            reconciler::merge_messages(txn, &response)
        })?;

        if let Err(err) = self
            .settings
            .set_value(keys::FETCH_AFTER_MSGS_ID, &outcome.watermark)
        {
            tracing::warn!(error = %err, "failed to mirror the message watermark");
        }
        tracing::info!(
            after,
            inserted = outcome.inserted,
            watermark = outcome.watermark,
            ?mode,
            "message fetch merged"
        );
        Ok(outcome)
    }

    async fn call(&self, request: ApiRequest) -> SyncResult<ResponseBody> {
        let request = request.with_context(&self.context());
        tracing::debug!(command = %request.command(), "sending request");
        self.transport.send(&request).await
    }

    fn context(&self) -> RequestContext {
        let mut context = self.config.context.clone();
        if let Some(key) = self.settings.get(keys::USER_SECURE_KEY) {
            context.user_secure_key = Some(key);
        }
        if let Some(id) = self.settings.get_i64(keys::IV_USER_ID) {
            context.iv_user_id = Some(id);
        }
        context
    }

    fn login_id(&self) -> SyncResult<String> {
        self.store
            .read(|state| state.profile.as_ref().map(|p| p.user_id.clone()))
            .ok_or(SyncError::NotSignedIn)
    }

    fn sim(&self) -> SimInfo {
        self.store
            .read(|state| {
                state.profile.as_ref().and_then(|p| {
                    p.country_iso_code.as_ref().map(|iso| SimInfo {
                        country_iso: iso.clone(),
                        mcc_mnc: p.sim_mcc_mnc.clone(),
                    })
                })
            })
            .unwrap_or_else(|| self.config.sim.clone())
    }

    fn clear_session(&self) -> SyncResult<()> {
        for key in keys::SESSION {
            self.settings.remove(key)?;
        }
        Ok(())
    }

    fn discard_profile(&self) {
        let result = self
            .store
            .transaction(|txn| Ok::<_, SyncError>(reconciler::delete_profile(txn)));
        if let Err(err) = result {
            tracing::error!(error = %err, "failed to discard provisional profile");
        }
    }

    async fn track<R>(
        &self,
        state: SyncState,
        flow: impl Future<Output = SyncResult<R>>,
    ) -> SyncResult<R> {
        self.tracker.begin(state);
        let result = flow.await;
        self.finish(&result, |_| 0);
        result
    }

    fn finish<R>(&self, result: &SyncResult<R>, messages: impl FnOnce(&R) -> usize) {
        match result {
            Ok(value) => self.tracker.succeed(messages(value)),
            Err(err) => {
                tracing::warn!(error = %err, "sync flow failed");
                self.tracker.fail(err);
            }
        }
    }
}
