//! Process-wide bookkeeping for player instances.
//!
//! A [`PlayerManager`] owns every live controller, the named mount points they
//! attach to and the currently-playing marker used for single-play exclusivity.
//! Everything is single-threaded; controllers reach back into the registry through
//! a weak handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::{PartialOptions, PlayerOptions};
use crate::error::{PlayerError, Result};
use crate::media::MediaElement;
use crate::player::PlayerController;
use crate::source::AudioFetcher;
use crate::sync::{FrameHandle, FrameQueue};

pub type PlayerHandle = Rc<RefCell<PlayerController>>;

/// A named place a player can attach to, with its current size.
#[derive(Debug, Clone, PartialEq)]
pub struct MountPoint {
    pub name: String,
    /// Width in CSS pixels.
    pub width: f32,
    pub device_pixel_ratio: f32,
    /// Options declared on the mount itself, below explicit options.
    pub declared: PartialOptions,
}

impl MountPoint {
    pub fn new(name: impl Into<String>, width: f32, device_pixel_ratio: f32) -> Self {
        Self {
            name: name.into(),
            width,
            device_pixel_ratio,
            declared: PartialOptions::default(),
        }
    }

    pub fn with_declared(mut self, declared: PartialOptions) -> Self {
        self.declared = declared;
        self
    }
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) instances: HashMap<String, PlayerHandle>,
    pub(crate) currently_playing: Option<String>,
    mounts: HashMap<String, MountPoint>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct PlayerManager {
    state: Rc<RefCell<RegistryState>>,
    frames: FrameQueue,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame queue shared by every player this manager creates.
    pub fn frames(&self) -> &FrameQueue {
        &self.frames
    }

    /// Make a mount point available to [`PlayerManager::create`].
    pub fn register_mount(&mut self, mount: MountPoint) {
        log::debug!(
            "registry: mount {} ({}px @{})",
            mount.name,
            mount.width,
            mount.device_pixel_ratio
        );
        self.state
            .borrow_mut()
            .mounts
            .insert(mount.name.clone(), mount);
    }

    /// Create a player attached to the mount named `target`.
    ///
    /// The player's id is the mount name, or `player-N` for an unnamed mount. An
    /// existing player with the same id is destroyed first. The initial load (when
    /// options carry a url) runs on the first frame the host dispatches, so
    /// listeners can subscribe before it.
    pub fn create(
        &mut self,
        target: &str,
        options: PartialOptions,
        media: Box<dyn MediaElement>,
        fetcher: Rc<dyn AudioFetcher>,
    ) -> Result<PlayerHandle> {
        let mount = self
            .state
            .borrow()
            .mounts
            .get(target)
            .cloned()
            .ok_or_else(|| PlayerError::ContainerMissing(target.to_string()))?;

        let id = if mount.name.is_empty() {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            format!("player-{}", state.next_id)
        } else {
            mount.name.clone()
        };

        if let Some(previous) = self.get(&id) {
            log::info!("registry: replacing player {id}");
            previous.borrow_mut().destroy();
        }

        let options: PlayerOptions = options.resolve_over(&mount.declared);
        let controller = PlayerController::new(
            id.clone(),
            &mount,
            options,
            media,
            fetcher,
            Box::new(self.frames.clone()),
            Rc::downgrade(&self.state),
        );
        let handle = Rc::new(RefCell::new(controller));
        self.state
            .borrow_mut()
            .instances
            .insert(id.clone(), Rc::clone(&handle));
        log::info!("registry: created player {id}");
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<PlayerHandle> {
        self.state.borrow().instances.get(id).cloned()
    }

    /// The live player attached to the mount named `name`.
    pub fn get_by_mount(&self, name: &str) -> Option<PlayerHandle> {
        self.all()
            .into_iter()
            .find(|player| player.borrow().mount() == name)
    }

    /// All live players, ordered by id.
    pub fn all(&self) -> Vec<PlayerHandle> {
        let state = self.state.borrow();
        let mut ids: Vec<&String> = state.instances.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| state.instances.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the player holding the currently-playing marker.
    pub fn currently_playing(&self) -> Option<String> {
        self.state.borrow().currently_playing.clone()
    }

    pub fn destroy(&mut self, id: &str) -> bool {
        match self.get(id) {
            Some(player) => {
                player.borrow_mut().destroy();
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&mut self) {
        for player in self.all() {
            player.borrow_mut().destroy();
        }
    }

    /// A mount changed size; players observing it resize and redraw.
    pub fn resize_mount(&mut self, name: &str, width: f32, device_pixel_ratio: f32) {
        if let Some(mount) = self.state.borrow_mut().mounts.get_mut(name) {
            mount.width = width;
            mount.device_pixel_ratio = device_pixel_ratio;
        }
        for player in self.all() {
            let mut player = player.borrow_mut();
            if player.mount() == name && player.observes_resize() {
                player.resize(width, device_pixel_ratio);
            }
        }
    }

    /// Hand one fired frame to the player that requested it.
    pub fn dispatch_frame(&mut self, handle: FrameHandle) -> bool {
        self.all()
            .into_iter()
            .any(|player| player.borrow_mut().on_animation_frame(handle))
    }

    /// Fire every due frame and apply pending media events.
    ///
    /// Hosts call this once per display refresh.
    pub fn tick(&mut self) {
        for handle in self.frames.take_due() {
            self.dispatch_frame(handle);
        }
        for player in self.all() {
            player.borrow_mut().dispatch_media_events();
        }
    }
}
