//! The shelf, the pinned power folders and the basket.
//!
//! Items created by ingestion can be temporary (written into a per-drop temp
//! directory). A temporary file is deleted only once no item in any container
//! still refers to the same standardized path, and its drop directory only
//! once no item lives in it anymore. Files the store turns down as duplicates
//! are deleted the same way.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::sys::fs::{remove_quietly, standardize_path};

pub const ITEMS_PER_ROW: usize = 5;

slotmap::new_key_type! {
    pub struct ShelfItemId;
}

/// A file produced by ingestion, ready to become a shelf item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub is_directory: bool,
    /// The drop directory the file was written into, for temporary files.
    pub temp_dir: Option<PathBuf>,
    /// The link a `.webloc` was written for. Links are matched by this
    /// string, since every drop writes a fresh file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl IngestedFile {
    /// A file that already existed on disk and is never deleted by us.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_directory = path.is_dir();
        Self { path, is_directory, temp_dir: None, source_url: None }
    }

    pub fn temporary(path: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            temp_dir: Some(temp_dir.into()),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfItem {
    pub id: ShelfItemId,
    pub source_path: PathBuf,
    pub is_directory: bool,
    pub is_pinned: bool,
    pub is_temporary: bool,
    pub temp_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Shelf,
    Pinned,
    Basket,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: Vec<ShelfItemId>,
    /// The caller should expand the shelf of the display that took the drop.
    pub wants_expand: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub item: ShelfItem,
    /// Paths deleted from disk as a consequence.
    pub deleted: Vec<PathBuf>,
}

pub struct ShelfItemStore {
    items: SlotMap<ShelfItemId, ShelfItem>,
    shelf: Vec<ShelfItemId>,
    pinned: Vec<ShelfItemId>,
    basket: Vec<ShelfItemId>,
    selected: HashSet<ShelfItemId>,
    power_folders: bool,
}

impl ShelfItemStore {
    pub fn new(power_folders: bool) -> Self {
        Self {
            items: SlotMap::with_key(),
            shelf: Vec::new(),
            pinned: Vec::new(),
            basket: Vec::new(),
            selected: HashSet::default(),
            power_folders,
        }
    }

    pub fn get(&self, id: ShelfItemId) -> Option<&ShelfItem> { self.items.get(id) }

    pub fn items(&self) -> impl Iterator<Item = &ShelfItem> + '_ { self.iter(&self.shelf) }

    pub fn pinned_folders(&self) -> impl Iterator<Item = &ShelfItem> + '_ {
        self.iter(&self.pinned)
    }

    pub fn basket_items(&self) -> impl Iterator<Item = &ShelfItem> + '_ {
        self.iter(&self.basket)
    }

    fn iter<'a>(&'a self, ids: &'a [ShelfItemId]) -> impl Iterator<Item = &'a ShelfItem> + 'a {
        ids.iter().filter_map(|id| self.items.get(*id))
    }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Rows the expanded shelf needs; feeds the expanded zone height.
    pub fn row_count(&self) -> usize {
        (self.shelf.len() + self.pinned.len()).div_ceil(ITEMS_PER_ROW)
    }

    fn container_of(&self, id: ShelfItemId) -> Option<Container> {
        if self.shelf.contains(&id) {
            Some(Container::Shelf)
        } else if self.pinned.contains(&id) {
            Some(Container::Pinned)
        } else if self.basket.contains(&id) {
            Some(Container::Basket)
        } else {
            None
        }
    }

    fn ids_mut(&mut self, container: Container) -> &mut Vec<ShelfItemId> {
        match container {
            Container::Shelf => &mut self.shelf,
            Container::Pinned => &mut self.pinned,
            Container::Basket => &mut self.basket,
        }
    }

    fn ids(&self, container: Container) -> &[ShelfItemId] {
        match container {
            Container::Shelf => &self.shelf,
            Container::Pinned => &self.pinned,
            Container::Basket => &self.basket,
        }
    }

    fn holds_path(&self, containers: &[Container], path: &Path) -> bool {
        containers.iter().any(|c| {
            self.iter(self.ids(*c)).any(|item| standardize_path(&item.source_path) == path)
        })
    }

    fn holds_url(&self, containers: &[Container], url: &str) -> bool {
        containers
            .iter()
            .any(|c| self.iter(self.ids(*c)).any(|item| item.source_url.as_deref() == Some(url)))
    }

    /// By standardized path, or by the link a temporary file was written for.
    fn holds_file(&self, containers: &[Container], file: &IngestedFile) -> bool {
        self.holds_path(containers, &standardize_path(&file.path))
            || file.source_url.as_deref().is_some_and(|url| self.holds_url(containers, url))
    }

    fn make_item(&mut self, file: &IngestedFile, pinned: bool) -> ShelfItemId {
        self.items.insert_with_key(|id| ShelfItem {
            id,
            source_path: file.path.clone(),
            is_directory: file.is_directory,
            is_pinned: pinned,
            is_temporary: file.temp_dir.is_some(),
            temp_dir: file.temp_dir.clone(),
            source_url: file.source_url.clone(),
        })
    }

    /// Appends files to the shelf, skipping any whose standardized path or
    /// link is already there. Directories become pinned power folders when
    /// enabled.
    pub fn add_items(&mut self, files: &[IngestedFile], should_auto_expand: bool) -> AddOutcome {
        let mut added = Vec::new();
        let mut skipped = Vec::new();
        for file in files {
            if self.holds_file(&[Container::Shelf, Container::Pinned], file) {
                trace!(path = ?file.path, "Already on shelf");
                skipped.push(file);
                continue;
            }
            let pinned = file.is_directory && self.power_folders;
            let id = self.make_item(file, pinned);
            self.ids_mut(if pinned { Container::Pinned } else { Container::Shelf }).push(id);
            added.push(id);
        }
        self.discard(&skipped);
        debug!(added = added.len(), offered = files.len(), "Added shelf items");
        AddOutcome {
            wants_expand: should_auto_expand && !added.is_empty(),
            added,
        }
    }

    pub fn add_basket_items(&mut self, files: &[IngestedFile]) -> Vec<ShelfItemId> {
        let mut added = Vec::new();
        let mut skipped = Vec::new();
        for file in files {
            if self.holds_file(&[Container::Basket], file) {
                trace!(path = ?file.path, "Already in basket");
                skipped.push(file);
                continue;
            }
            let id = self.make_item(file, false);
            self.basket.push(id);
            added.push(id);
        }
        self.discard(&skipped);
        added
    }

    /// Removes a shelf item or pinned folder.
    pub fn remove_item(&mut self, id: ShelfItemId) -> Option<Removed> {
        match self.container_of(id)? {
            Container::Basket => None,
            container => self.detach(container, id),
        }
    }

    pub fn remove_basket_item(&mut self, id: ShelfItemId) -> Option<Removed> {
        match self.container_of(id)? {
            Container::Basket => self.detach(Container::Basket, id),
            _ => None,
        }
    }

    /// Removes every regular shelf item. Pinned folders stay.
    pub fn clear_shelf(&mut self) -> Vec<Removed> {
        let ids = self.shelf.clone();
        ids.into_iter().filter_map(|id| self.detach(Container::Shelf, id)).collect()
    }

    pub fn clear_basket(&mut self) -> Vec<Removed> {
        let ids = self.basket.clone();
        ids.into_iter().filter_map(|id| self.detach(Container::Basket, id)).collect()
    }

    /// Swaps `id` for `new_file` in place. The replacement gets a new id and
    /// inherits the position and selection membership.
    pub fn replace_item(
        &mut self,
        id: ShelfItemId,
        new_file: &IngestedFile,
    ) -> Option<ShelfItemId> {
        let container = self.container_of(id)?;
        let pinned = self.items.get(id)?.is_pinned;
        let index = self.ids_mut(container).iter().position(|x| *x == id)?;
        let new_id = self.make_item(new_file, pinned);
        self.ids_mut(container)[index] = new_id;
        if self.selected.remove(&id) {
            self.selected.insert(new_id);
        }
        if let Some(old) = self.items.remove(id) {
            self.cleanup(&old);
        }
        Some(new_id)
    }

    fn detach(&mut self, container: Container, id: ShelfItemId) -> Option<Removed> {
        let ids = self.ids_mut(container);
        let index = ids.iter().position(|x| *x == id)?;
        ids.remove(index);
        self.selected.remove(&id);
        let item = self.items.remove(id)?;
        let deleted = self.cleanup(&item);
        Some(Removed { item, deleted })
    }

    /// Deletes the backing files of a temporary item that no container refers
    /// to anymore. `item` must already be gone from the store.
    fn cleanup(&self, item: &ShelfItem) -> Vec<PathBuf> {
        if !item.is_temporary {
            return Vec::new();
        }
        self.release(&item.source_path, item.temp_dir.as_deref())
    }

    /// Deletes what ingestion wrote for duplicates nobody will hold.
    fn discard(&self, files: &[&IngestedFile]) {
        for file in files.iter().filter(|file| file.temp_dir.is_some()) {
            let deleted = self.release(&file.path, file.temp_dir.as_deref());
            trace!(?deleted, "Discarded duplicate temporary file");
        }
    }

    fn release(&self, path: &Path, temp_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut deleted = Vec::new();
        let path = standardize_path(path);
        let all = [Container::Shelf, Container::Pinned, Container::Basket];
        if self.holds_path(&all, &path) {
            debug!(?path, "Temporary file still referenced; keeping it");
            return deleted;
        }
        if remove_quietly(&path) {
            deleted.push(path);
        }
        if let Some(dir) = temp_dir {
            let dir = standardize_path(dir);
            let in_use = self
                .items
                .values()
                .any(|other| other.temp_dir.as_deref().is_some_and(|d| standardize_path(d) == dir));
            if !in_use && remove_quietly(&dir) {
                deleted.push(dir);
            }
        }
        deleted
    }

    pub fn select(&mut self, id: ShelfItemId) -> bool {
        self.items.contains_key(id) && self.selected.insert(id)
    }

    pub fn deselect(&mut self, id: ShelfItemId) -> bool { self.selected.remove(&id) }

    pub fn is_selected(&self, id: ShelfItemId) -> bool { self.selected.contains(&id) }
}
