//! List editing operations (`prepend references = ...`, `delete inherits = ...`).

/// How a [`ListOp`] edits a weaker list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListOpKind {
    Explicit,
    Added,
    Prepended,
    Appended,
    Deleted,
    Ordered,
}

impl ListOpKind {
    /// usda keyword preceding the statement (`""` for explicit).
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Explicit => "",
            Self::Added => "add",
            Self::Prepended => "prepend",
            Self::Appended => "append",
            Self::Deleted => "delete",
            Self::Ordered => "reorder",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Added),
            "prepend" => Some(Self::Prepended),
            "append" => Some(Self::Appended),
            "delete" => Some(Self::Deleted),
            "reorder" => Some(Self::Ordered),
            _ => None,
        }
    }
}

/// A set of edits applied to a list authored in weaker layers.
///
/// In explicit mode the op replaces the weaker list outright. Otherwise
/// it removes `deleted`, inserts `added` and `prepended` at the front,
/// pushes `appended` at the back, and finally reorders by `ordered`.
#[derive(Clone, Debug, PartialEq)]
pub struct ListOp<T> {
    is_explicit: bool,
    explicit_items: Vec<T>,
    added_items: Vec<T>,
    prepended_items: Vec<T>,
    appended_items: Vec<T>,
    deleted_items: Vec<T>,
    ordered_items: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        Self {
            is_explicit: false,
            explicit_items: Vec::new(),
            added_items: Vec::new(),
            prepended_items: Vec::new(),
            appended_items: Vec::new(),
            deleted_items: Vec::new(),
            ordered_items: Vec::new(),
        }
    }
}

fn push_unique<T: PartialEq + Clone>(list: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !list.contains(item) {
            list.push(item.clone());
        }
    }
}

fn dedup<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    push_unique(&mut out, items);
    out
}

impl<T: Clone + PartialEq> ListOp<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// An op that replaces the weaker list with `items`.
    pub fn explicit(items: Vec<T>) -> Self {
        Self {
            is_explicit: true,
            explicit_items: items,
            ..Self::default()
        }
    }

    /// An op holding a single kind of edit.
    pub fn with(kind: ListOpKind, items: Vec<T>) -> Self {
        let mut op = Self::default();
        op.set_items(kind, items);
        op
    }

    pub fn prepended(items: Vec<T>) -> Self {
        Self::with(ListOpKind::Prepended, items)
    }

    pub fn appended(items: Vec<T>) -> Self {
        Self::with(ListOpKind::Appended, items)
    }

    pub fn deleted(items: Vec<T>) -> Self {
        Self::with(ListOpKind::Deleted, items)
    }

    #[inline]
    pub fn is_explicit(&self) -> bool {
        self.is_explicit
    }

    /// No edits at all.
    pub fn is_empty(&self) -> bool {
        !self.is_explicit
            && self.added_items.is_empty()
            && self.prepended_items.is_empty()
            && self.appended_items.is_empty()
            && self.deleted_items.is_empty()
            && self.ordered_items.is_empty()
    }

    pub fn items(&self, kind: ListOpKind) -> &[T] {
        match kind {
            ListOpKind::Explicit => &self.explicit_items,
            ListOpKind::Added => &self.added_items,
            ListOpKind::Prepended => &self.prepended_items,
            ListOpKind::Appended => &self.appended_items,
            ListOpKind::Deleted => &self.deleted_items,
            ListOpKind::Ordered => &self.ordered_items,
        }
    }

    pub fn explicit_items(&self) -> &[T] {
        &self.explicit_items
    }

    pub fn prepended_items(&self) -> &[T] {
        &self.prepended_items
    }

    pub fn appended_items(&self) -> &[T] {
        &self.appended_items
    }

    pub fn deleted_items(&self) -> &[T] {
        &self.deleted_items
    }

    /// Replace one list. Setting explicit items switches the op to
    /// explicit mode and clears every other list; setting any other list
    /// leaves explicit mode.
    pub fn set_items(&mut self, kind: ListOpKind, items: Vec<T>) {
        match kind {
            ListOpKind::Explicit => *self = Self::explicit(items),
            _ => {
                if self.is_explicit {
                    self.is_explicit = false;
                    self.explicit_items.clear();
                }
                match kind {
                    ListOpKind::Added => self.added_items = items,
                    ListOpKind::Prepended => self.prepended_items = items,
                    ListOpKind::Appended => self.appended_items = items,
                    ListOpKind::Deleted => self.deleted_items = items,
                    ListOpKind::Ordered => self.ordered_items = items,
                    ListOpKind::Explicit => {}
                }
            }
        }
    }

    /// Apply the edits to `list` in place.
    pub fn apply_to(&self, list: &mut Vec<T>) {
        if self.is_explicit {
            *list = dedup(&self.explicit_items);
            return;
        }

        list.retain(|x| !self.deleted_items.contains(x));

        if !self.added_items.is_empty() {
            let fresh: Vec<T> = dedup(&self.added_items)
                .into_iter()
                .filter(|x| !list.contains(x))
                .collect();
            list.splice(0..0, fresh);
        }

        if !self.prepended_items.is_empty() {
            let front = dedup(&self.prepended_items);
            list.retain(|x| !front.contains(x));
            list.splice(0..0, front);
        }

        if !self.appended_items.is_empty() {
            let back = dedup(&self.appended_items);
            list.retain(|x| !back.contains(x));
            list.extend(back);
        }

        if !self.ordered_items.is_empty() {
            reorder(list, &self.ordered_items);
        }
    }

    /// Apply the edits to a copy of `list`.
    pub fn apply(&self, list: &[T]) -> Vec<T> {
        let mut out = list.to_vec();
        self.apply_to(&mut out);
        out
    }

    /// The list this op produces over an empty weaker list.
    pub fn resolve(&self) -> Vec<T> {
        self.apply(&[])
    }

    /// Merge a later statement of the same metadata block.
    ///
    /// Each kind fills its own list, so `prepend` and `add` statements keep
    /// their usual relative order no matter how they were written. A later
    /// `delete` also cancels earlier inserts of the same items, and a later
    /// insert cancels an earlier delete. An explicit statement replaces
    /// everything; edits after an explicit one apply to its items.
    pub fn merge_statement(&mut self, later: &ListOp<T>) {
        if later.is_explicit {
            *self = later.clone();
            return;
        }
        if self.is_explicit {
            later.apply_to(&mut self.explicit_items);
            return;
        }

        for d in &later.deleted_items {
            self.added_items.retain(|x| x != d);
            self.prepended_items.retain(|x| x != d);
            self.appended_items.retain(|x| x != d);
        }
        push_unique(&mut self.deleted_items, &later.deleted_items);

        for (slot, items) in [
            (&mut self.added_items, &later.added_items),
            (&mut self.prepended_items, &later.prepended_items),
            (&mut self.appended_items, &later.appended_items),
        ] {
            self.deleted_items.retain(|x| !items.contains(x));
            push_unique(slot, items);
        }

        if !later.ordered_items.is_empty() {
            self.ordered_items = later.ordered_items.clone();
        }
    }

    /// Compose over the accumulated op of weaker layers.
    ///
    /// Both ops are read as edits of the empty list: the result resolves
    /// to `weaker.resolve()` with `self` applied on top. When both sides
    /// carry edits the result is explicit, since a stronger insert can
    /// land ahead of a weaker prepend in a way no single op expresses.
    pub fn compose_over(&self, weaker: &ListOp<T>) -> ListOp<T> {
        if self.is_explicit || weaker.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return weaker.clone();
        }
        ListOp::explicit(self.apply(&weaker.resolve()))
    }

    /// Transform every item.
    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> ListOp<U> {
        let mut conv = |v: &Vec<T>| v.iter().map(&mut f).collect::<Vec<U>>();
        ListOp {
            is_explicit: self.is_explicit,
            explicit_items: conv(&self.explicit_items),
            added_items: conv(&self.added_items),
            prepended_items: conv(&self.prepended_items),
            appended_items: conv(&self.appended_items),
            deleted_items: conv(&self.deleted_items),
            ordered_items: conv(&self.ordered_items),
        }
    }

    /// Non-empty lists in canonical output order.
    pub fn statements(&self) -> Vec<(ListOpKind, &[T])> {
        if self.is_explicit {
            return vec![(ListOpKind::Explicit, self.explicit_items.as_slice())];
        }
        [
            ListOpKind::Deleted,
            ListOpKind::Added,
            ListOpKind::Prepended,
            ListOpKind::Appended,
            ListOpKind::Ordered,
        ]
        .into_iter()
        .map(|k| (k, self.items(k)))
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }
}

/// Move items named in `order` into that order. Unnamed items keep their
/// position relative to the named item preceding them.
fn reorder<T: Clone + PartialEq>(list: &mut Vec<T>, order: &[T]) {
    let mut leading = Vec::new();
    let mut groups: Vec<(T, Vec<T>)> = Vec::new();
    for item in list.drain(..) {
        if order.contains(&item) {
            groups.push((item, Vec::new()));
        } else if let Some((_, tail)) = groups.last_mut() {
            tail.push(item);
        } else {
            leading.push(item);
        }
    }

    list.extend(leading);
    for key in order {
        if let Some(pos) = groups.iter().position(|(k, _)| k == key) {
            let (k, tail) = groups.remove(pos);
            list.push(k);
            list.extend(tail);
        }
    }
    for (k, tail) in groups {
        list.push(k);
        list.extend(tail);
    }
}
