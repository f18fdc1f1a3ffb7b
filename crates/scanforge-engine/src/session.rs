//! Scanner-control session: acquisition on top of the compound machine.
//!
//! A [`Scanner`] owns a [`Compound`] machine and layers the acquisition
//! state over it: page-start/page-end tracking per sheet side, image
//! counting, duplex accounting, cooperative cancellation, and fault
//! classification. All session state mutates only as replies arrive; the
//! device is the source of truth and the session follows it.
//!
//! ```text
//! NotAcquiring ──start_scan, clean reply──▶ Acquiring
//!      ▲                                       │
//!      ├── feeder drained (pages remaining 0) ─┤
//!      ├── cancel confirmed ───────────────────┤
//!      └── hard fault / finish ────────────────┘
//! ```

use bytes::{Bytes, BytesMut};
use tracing::{debug, info as log_info, warn};

use scanforge_channel::Channel;
use scanforge_core::{CancelToken, DocumentSource, Error, Fault, Result, Side};
use scanforge_protocol::token::{parameter as par, request};
use scanforge_protocol::{Capabilities, Information, MechanicsAction, Parameters, format};

use crate::buffer::{DataBuffer, DeliveryPolicy, SideQueues};
use crate::compound::{Compound, Reply};
use crate::fault;
use crate::profile::{self, ModelProfile};
use crate::refdata::ReferenceData;

/// Image chunk size requested per fetch when neither the parameters nor
/// the device information name a buffer size.
const DEFAULT_CHUNK_SIZE: u32 = 65536;

/// Notification payload for the page progress hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    pub side: Side,
    /// 1-based index of the image this event belongs to.
    pub image: u32,
}

type PageHook = Box<dyn FnMut(PageEvent) + Send>;

/// One scanner connection: negotiated state plus the acquisition machine.
pub struct Scanner<C: Channel> {
    compound: Compound<C>,
    info: Information,
    profile: Option<&'static ModelProfile>,
    caps: Capabilities,
    caps_flip: Option<Capabilities>,
    params: Parameters,
    params_flip: Option<Parameters>,

    // acquisition state, mutated only as replies arrive
    acquiring: bool,
    cancel: CancelToken,
    cancelled: bool,
    face_active: bool,
    rear_active: bool,
    images_started: u32,
    pages_pending: Option<u32>,
    duplex: bool,

    queues: SideQueues,
    on_page_start: Option<PageHook>,
    on_page_end: Option<PageHook>,
}

impl<C: Channel> Scanner<C> {
    /// Open a session: claim the channel and negotiate device state.
    ///
    /// Reads the information block once, selects the per-model profile by
    /// product name, then reads capabilities and current parameters (and
    /// their flip-side variants on duplex-capable hardware).
    pub async fn open(channel: C) -> Result<Self> {
        let mut compound = Compound::new(channel);

        let info = compound.get_information().await?;
        let profile = info.product.as_deref().and_then(profile::lookup);
        if let Some(profile) = profile {
            log_info!(product = profile.product, "model profile selected");
        }

        let mut caps = compound.get_capabilities(false).await?;
        let mut params = compound.get_parameters(false).await?;

        let duplex_capable = info.adf.as_ref().is_some_and(|a| a.supports_duplex());
        let caps_flip = if duplex_capable {
            Some(compound.get_capabilities(true).await?)
        } else {
            None
        };
        let params_flip = if duplex_capable {
            Some(compound.get_parameters(true).await?)
        } else {
            None
        };

        if let Some(profile) = profile {
            profile.apply(&mut caps, &mut params);
        }

        Ok(Scanner {
            compound,
            info,
            profile,
            caps,
            caps_flip,
            params,
            params_flip,
            acquiring: false,
            cancel: CancelToken::new(),
            cancelled: false,
            face_active: false,
            rear_active: false,
            images_started: 0,
            pages_pending: None,
            duplex: false,
            queues: SideQueues::new(DeliveryPolicy::FrontNonEmpty, false),
            on_page_start: None,
            on_page_end: None,
        })
    }

    // ------------------------------------------------------------------
    // Negotiated state
    // ------------------------------------------------------------------

    #[must_use]
    pub fn information(&self) -> &Information {
        &self.info
    }

    #[must_use]
    pub fn profile(&self) -> Option<&'static ModelProfile> {
        self.profile
    }

    /// Capabilities for both sides, or the flip side when `flip` is set.
    #[must_use]
    pub fn capabilities(&self, flip: bool) -> Option<&Capabilities> {
        if flip {
            self.caps_flip.as_ref()
        } else {
            Some(&self.caps)
        }
    }

    #[must_use]
    pub fn parameters(&self, flip: bool) -> Option<&Parameters> {
        if flip {
            self.params_flip.as_ref()
        } else {
            Some(&self.params)
        }
    }

    /// Send a parameter set to the device and remember it on success.
    pub async fn set_parameters(&mut self, params: Parameters, flip: bool) -> Result<()> {
        self.compound.set_parameters(&params, flip).await?;
        if flip {
            self.params_flip = Some(params);
        } else {
            self.params = params;
        }
        Ok(())
    }

    /// Seed negotiated state from an on-disk reference file.
    ///
    /// Blocks present in the reference data replace what the device
    /// reported; the product name is run through the marketing-name
    /// substitution table.
    pub fn apply_reference(&mut self, reference: &ReferenceData) {
        if let Some(info) = &reference.information {
            self.info = info.clone();
        }
        if let Some(caps) = &reference.capabilities {
            self.caps = caps.clone();
        }
        if let Some(caps) = &reference.capabilities_flip {
            self.caps_flip = Some(caps.clone());
        }
        if let Some(params) = &reference.parameters {
            self.params = params.clone();
        }
        if let Some(params) = &reference.parameters_flip {
            self.params_flip = Some(params.clone());
        }
        if let Some(raw) = self.info.product.clone() {
            if let Some(name) = reference.marketing_name(&raw) {
                self.info.product = Some(name.to_string());
            }
        }
    }

    /// Pass-through to the typed hardware status operation.
    pub async fn hardware_status(&mut self) -> Result<scanforge_protocol::HardwareStatus> {
        self.compound.get_status().await
    }

    /// Pass-through to the mechanics operation.
    pub async fn mechanics(&mut self, action: MechanicsAction) -> Result<()> {
        self.compound.mechanics(action).await
    }

    // ------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    #[must_use]
    pub fn images_started(&self) -> u32 {
        self.images_started
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// A clone of the session's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation.
    ///
    /// Takes effect at the next image fetch, which sends a cancel request
    /// instead and returns an empty cancel-attention buffer once the
    /// device confirms.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Install a page-start notification hook.
    pub fn on_page_start(&mut self, hook: impl FnMut(PageEvent) + Send + 'static) {
        self.on_page_start = Some(Box::new(hook));
    }

    /// Install a page-end notification hook.
    pub fn on_page_end(&mut self, hook: impl FnMut(PageEvent) + Send + 'static) {
        self.on_page_end = Some(Box::new(hook));
    }

    /// Start acquiring with the current parameters.
    pub async fn start_scan(&mut self) -> Result<()> {
        if self.acquiring {
            return Err(Error::InvalidStateTransition {
                from: "Acquiring".into(),
                to: "Acquiring".into(),
            });
        }
        self.params.validate()?;

        self.duplex = self.params.is_duplex();
        self.pages_pending = match self.params.page_count {
            Some(0) | None => None,
            Some(n) => Some(n),
        };
        self.images_started = 0;
        self.face_active = false;
        self.rear_active = false;
        self.cancelled = false;
        self.cancel.reset();
        self.queues = SideQueues::new(self.delivery_policy(), self.is_jpeg());

        let reply = self.compound.transact(request::START_SCAN, &[]).await?;
        self.acquiring = true;
        self.process_reply(&reply)?;
        Ok(())
    }

    /// Fetch the next deliverable image buffer.
    ///
    /// Returns `Ok(None)` once the batch is over and every queued chunk
    /// has been delivered. A pending cancellation is honored here, at the
    /// session's natural suspension point, before any further request
    /// goes out.
    pub async fn next_buffer(&mut self) -> Result<Option<DataBuffer>> {
        loop {
            if let Some(buffer) = self.queues.pop() {
                return Ok(Some(buffer));
            }
            if !self.acquiring {
                return Ok(None);
            }
            if self.cancel.is_cancelled() && !self.cancelled {
                return self.send_cancel().await.map(Some);
            }

            let mut payload = BytesMut::new();
            format::put_numeric(&mut payload, self.chunk_size() as i32)?;
            let reply = match self.compound.transact(request::IMAGE, &payload).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.acquiring = false;
                    return Err(e);
                }
            };
            self.process_reply(&reply)?;

            if !reply.payload.is_empty()
                || reply.status.page_start.is_some()
                || reply.status.page_end.is_some()
            {
                self.queues
                    .push(DataBuffer::new(reply.payload.clone(), reply.status.clone()));
            }
        }
    }

    /// Send the cancel request and return the confirmation buffer.
    async fn send_cancel(&mut self) -> Result<DataBuffer> {
        debug!("cancellation observed, sending cancel request");
        let reply = match self.compound.transact(request::CANCEL, &[]).await {
            Ok(reply) => reply,
            Err(e) => {
                self.acquiring = false;
                return Err(e);
            }
        };
        self.process_reply(&reply)?;
        self.queues.clear();
        if !self.cancelled {
            warn!("cancel reply without cancel confirmation");
        }
        Ok(DataBuffer::new(Bytes::new(), reply.status.clone()))
    }

    /// Update session state from one reply.
    ///
    /// Page markers are handled first (page-start wins when the device
    /// illegally sends both), then the error list, then the reply code
    /// itself.
    fn process_reply(&mut self, reply: &Reply) -> Result<()> {
        let status = &reply.status;

        if status.page_start.is_some() {
            let side = status.side.unwrap_or(Side::Face);
            self.set_side_active(side, true);
            self.images_started += 1;
            let event = PageEvent {
                side,
                image: self.images_started,
            };
            debug!(side = %side, image = event.image, "page start");
            if let Some(hook) = &mut self.on_page_start {
                hook(event);
            }
        } else if status.page_end.is_some() {
            let side = status.side.unwrap_or(Side::Face);
            self.set_side_active(side, false);
            let event = PageEvent {
                side,
                image: self.images_started,
            };
            debug!(side = %side, image = event.image, "page end");
            if let Some(pending) = &mut self.pages_pending {
                *pending = pending.saturating_sub(if self.duplex { 2 } else { 1 });
                if *pending == 0 && self.feeder_active() {
                    debug!("page count satisfied, leaving acquisition");
                    self.acquiring = false;
                }
            }
            if let Some(hook) = &mut self.on_page_end {
                hook(event);
            }
        }

        if let Some(fault) = fault::classify(&status.errors) {
            if fault == Fault::MediaOut {
                if self.media_out_is_fatal() {
                    self.acquiring = false;
                    return Err(Error::DeviceFault(Fault::MediaOut));
                }
                debug!("media out after batch, ending acquisition");
                self.acquiring = false;
            } else {
                self.acquiring = false;
                return Err(Error::DeviceFault(fault));
            }
        }

        if reply.header.code == request::CANCEL {
            self.acquiring = false;
            self.cancelled = true;
        }
        if reply.header.code == request::FINISH {
            self.acquiring = false;
        }
        if status.is_cancel_attention() {
            self.acquiring = false;
            self.cancelled = true;
        }
        Ok(())
    }

    /// Media-out ends the batch unless nothing was ever acquired: with no
    /// side mid-page and zero images started it means the feeder was
    /// empty from the outset.
    fn media_out_is_fatal(&self) -> bool {
        !self.face_active && !self.rear_active && self.images_started == 0
    }

    fn set_side_active(&mut self, side: Side, active: bool) {
        match side {
            Side::Face => self.face_active = active,
            Side::Rear => self.rear_active = active,
        }
    }

    fn feeder_active(&self) -> bool {
        self.params.source() == Some(DocumentSource::Adf)
    }

    fn delivery_policy(&self) -> DeliveryPolicy {
        let source_detects_end = self
            .params
            .source()
            .and_then(|s| self.info.source(s))
            .is_some_and(|s| s.detects_page_end())
            || self
                .params
                .adf
                .as_ref()
                .is_some_and(|flags| flags.contains(&scanforge_protocol::token::source::FLAG_PAGE_END_DETECT));

        if self.info.truncates_at_media_end || source_detects_end {
            DeliveryPolicy::WaitForPageEnd
        } else {
            DeliveryPolicy::FrontNonEmpty
        }
    }

    fn is_jpeg(&self) -> bool {
        self.params.format == Some(par::FMT_JPEG)
    }

    fn chunk_size(&self) -> u32 {
        self.params
            .buffer_size
            .or(self.info.buffer_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Run the `finish` exchange and release the channel.
    pub async fn finish(self) -> Result<C> {
        self.compound.finish().await
    }
}
