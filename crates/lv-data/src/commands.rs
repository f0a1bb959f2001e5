//! Undoable commands operating on a [`DataCollection`]
//!
//! Each command can be built from keyword arguments, failing up front when a
//! declared keyword is missing, or directly through its typed constructor.

use lv_core::command::{Command, CommandArgs, CommandError, Result};
use lv_core::{DataId, LinkId, SubsetId};

use crate::collection::{DataCollection, RemovedData};
use crate::data::Data;
use crate::link::Link;
use crate::subset::Subset;
use crate::subset_state::{CombineMode, SubsetState};

/// Values accepted as command keywords
#[derive(Debug, Clone)]
pub enum CommandValue {
    Data(Box<Data>),
    DataId(DataId),
    SubsetId(SubsetId),
    Link(Link),
    State(SubsetState),
    Mode(CombineMode),
    Label(String),
}

pub type DataArgs = CommandArgs<CommandValue>;

macro_rules! take_as {
    ($args:expr, $kind:expr, $keyword:expr, $variant:ident) => {
        match $args.take($kind, $keyword)? {
            CommandValue::$variant(value) => value,
            _ => {
                return Err(CommandError::WrongKeywordType {
                    kind: $kind,
                    keyword: $keyword.to_string(),
                })
            }
        }
    };
}

fn failed(kind: &'static str) -> impl FnOnce(crate::DataError) -> CommandError {
    move |e| CommandError::failed(kind, e)
}

/// Put a removed dataset back, keeping it for a retry when that fails
fn restore(session: &mut DataCollection, removed: &mut Option<RemovedData>, kind: &'static str) -> Result<()> {
    let pending = removed
        .as_ref()
        .ok_or_else(|| CommandError::failed(kind, anyhow::anyhow!("nothing to restore")))?;
    session.check_restore(pending).map_err(failed(kind))?;
    if let Some(pending) = removed.take() {
        session.restore(pending).map_err(failed(kind))?;
    }
    Ok(())
}

/// Add a dataset to the collection
pub struct AddData {
    data: Option<Data>,
    id: DataId,
    removed: Option<RemovedData>,
}

impl AddData {
    pub const KIND: &'static str = "AddData";
    pub const REQUIRED: &'static [&'static str] = &["data"];

    pub fn new(data: Data) -> Self {
        Self {
            id: data.id(),
            data: Some(data),
            removed: None,
        }
    }

    pub fn from_args(mut args: DataArgs) -> Result<Self> {
        args.require(Self::KIND, Self::REQUIRED)?;
        let data = take_as!(args, Self::KIND, "data", Data);
        Ok(Self::new(*data))
    }

    pub fn data_id(&self) -> DataId {
        self.id
    }
}

impl Command<DataCollection> for AddData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn execute(&mut self, session: &mut DataCollection) -> Result<()> {
        if let Some(data) = self.data.take() {
            session.append(data).map_err(failed(Self::KIND))?;
        } else {
            restore(session, &mut self.removed, Self::KIND)?;
        }
        Ok(())
    }

    fn undo(&mut self, session: &mut DataCollection) -> Result<()> {
        self.removed = Some(session.remove(self.id).map_err(failed(Self::KIND))?);
        Ok(())
    }
}

/// Remove a dataset, its subsets and the links that reference it
pub struct RemoveData {
    id: DataId,
    removed: Option<RemovedData>,
}

impl RemoveData {
    pub const KIND: &'static str = "RemoveData";
    pub const REQUIRED: &'static [&'static str] = &["data"];

    pub fn new(id: DataId) -> Self {
        Self { id, removed: None }
    }

    pub fn from_args(mut args: DataArgs) -> Result<Self> {
        args.require(Self::KIND, Self::REQUIRED)?;
        Ok(Self::new(take_as!(args, Self::KIND, "data", DataId)))
    }
}

impl Command<DataCollection> for RemoveData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn execute(&mut self, session: &mut DataCollection) -> Result<()> {
        self.removed = Some(session.remove(self.id).map_err(failed(Self::KIND))?);
        Ok(())
    }

    fn undo(&mut self, session: &mut DataCollection) -> Result<()> {
        restore(session, &mut self.removed, Self::KIND)
    }
}

/// Register a link
pub struct AddLink {
    link: Option<Link>,
    id: Option<LinkId>,
}

impl AddLink {
    pub const KIND: &'static str = "AddLink";
    pub const REQUIRED: &'static [&'static str] = &["link"];

    pub fn new(link: impl Into<Link>) -> Self {
        Self {
            link: Some(link.into()),
            id: None,
        }
    }

    pub fn from_args(mut args: DataArgs) -> Result<Self> {
        args.require(Self::KIND, Self::REQUIRED)?;
        Ok(Self::new(take_as!(args, Self::KIND, "link", Link)))
    }

    /// Id of the link once executed
    pub fn link_id(&self) -> Option<LinkId> {
        self.id
    }
}

impl Command<DataCollection> for AddLink {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn execute(&mut self, session: &mut DataCollection) -> Result<()> {
        let link = self
            .link
            .take()
            .ok_or_else(|| CommandError::failed(Self::KIND, anyhow::anyhow!("link already registered")))?;
        match self.id {
            Some(id) => session.insert_link(id, link).map_err(failed(Self::KIND))?,
            None => self.id = Some(session.add_link(link).map_err(failed(Self::KIND))?),
        }
        Ok(())
    }

    fn undo(&mut self, session: &mut DataCollection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| CommandError::failed(Self::KIND, anyhow::anyhow!("link was never registered")))?;
        self.link = Some(session.remove_link(id).map_err(failed(Self::KIND))?);
        Ok(())
    }
}

/// Create a subset on one dataset
pub struct NewSubset {
    data: DataId,
    label: String,
    state: SubsetState,
    id: Option<SubsetId>,
    removed: Option<Subset>,
}

impl NewSubset {
    pub const KIND: &'static str = "NewSubset";
    pub const REQUIRED: &'static [&'static str] = &["data", "label", "state"];

    pub fn new(data: DataId, label: impl Into<String>, state: SubsetState) -> Self {
        Self {
            data,
            label: label.into(),
            state,
            id: None,
            removed: None,
        }
    }

    pub fn from_args(mut args: DataArgs) -> Result<Self> {
        args.require(Self::KIND, Self::REQUIRED)?;
        let data = take_as!(args, Self::KIND, "data", DataId);
        let label = take_as!(args, Self::KIND, "label", Label);
        let state = take_as!(args, Self::KIND, "state", State);
        Ok(Self::new(data, label, state))
    }

    pub fn subset_id(&self) -> Option<SubsetId> {
        self.id
    }
}

impl Command<DataCollection> for NewSubset {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn execute(&mut self, session: &mut DataCollection) -> Result<()> {
        match self.removed.take() {
            Some(subset) => session.restore_subset(subset).map_err(failed(Self::KIND))?,
            None => {
                let id = session
                    .new_subset(self.data, self.label.clone(), self.state.clone())
                    .map_err(failed(Self::KIND))?;
                self.id = Some(id);
            }
        }
        Ok(())
    }

    fn undo(&mut self, session: &mut DataCollection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| CommandError::failed(Self::KIND, anyhow::anyhow!("subset was never created")))?;
        self.removed = Some(session.remove_subset(id).map_err(failed(Self::KIND))?);
        Ok(())
    }
}

/// Merge a selection into an existing subset
pub struct ApplySubsetState {
    subset: SubsetId,
    state: SubsetState,
    mode: CombineMode,
    previous: Option<SubsetState>,
}

impl ApplySubsetState {
    pub const KIND: &'static str = "ApplySubsetState";
    pub const REQUIRED: &'static [&'static str] = &["subset", "state"];

    pub fn new(subset: SubsetId, state: SubsetState, mode: CombineMode) -> Self {
        Self {
            subset,
            state,
            mode,
            previous: None,
        }
    }

    /// `mode` is optional and defaults to replacing the state
    pub fn from_args(mut args: DataArgs) -> Result<Self> {
        args.require(Self::KIND, Self::REQUIRED)?;
        let subset = take_as!(args, Self::KIND, "subset", SubsetId);
        let state = take_as!(args, Self::KIND, "state", State);
        let mode = if args.contains("mode") {
            take_as!(args, Self::KIND, "mode", Mode)
        } else {
            CombineMode::default()
        };
        Ok(Self::new(subset, state, mode))
    }
}

impl Command<DataCollection> for ApplySubsetState {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn execute(&mut self, session: &mut DataCollection) -> Result<()> {
        let previous = session
            .apply_subset_state(self.subset, self.state.clone(), self.mode)
            .map_err(failed(Self::KIND))?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, session: &mut DataCollection) -> Result<()> {
        let previous = self
            .previous
            .take()
            .ok_or_else(|| CommandError::failed(Self::KIND, anyhow::anyhow!("nothing to revert")))?;
        session
            .set_subset_state(self.subset, previous)
            .map_err(failed(Self::KIND))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_core::CommandStack;

    fn table(label: &str) -> Data {
        Data::from_columns(label, vec![("x", vec![1.0, 2.0, 3.0])]).unwrap()
    }

    #[test]
    fn test_missing_keyword_at_construction() {
        let err = NewSubset::from_args(DataArgs::new().with("label", CommandValue::Label("s".into())))
            .err()
            .unwrap();
        assert!(matches!(err, CommandError::MissingKeyword { keyword, .. } if keyword == "data"));
    }

    #[test]
    fn test_wrong_keyword_type() {
        let err = RemoveData::from_args(DataArgs::new().with("data", CommandValue::Label("d".into())))
            .err()
            .unwrap();
        assert!(matches!(err, CommandError::WrongKeywordType { .. }));
    }

    #[test]
    fn test_kinds_and_required_keywords() {
        fn first_missing(err: CommandError) -> (&'static str, String) {
            match err {
                CommandError::MissingKeyword { kind, keyword } => (kind, keyword),
                other => panic!("unexpected error {other}"),
            }
        }

        let cases = [
            (AddData::KIND, AddData::REQUIRED, AddData::from_args(DataArgs::new()).err().unwrap()),
            (RemoveData::KIND, RemoveData::REQUIRED, RemoveData::from_args(DataArgs::new()).err().unwrap()),
            (AddLink::KIND, AddLink::REQUIRED, AddLink::from_args(DataArgs::new()).err().unwrap()),
            (NewSubset::KIND, NewSubset::REQUIRED, NewSubset::from_args(DataArgs::new()).err().unwrap()),
            (
                ApplySubsetState::KIND,
                ApplySubsetState::REQUIRED,
                ApplySubsetState::from_args(DataArgs::new()).err().unwrap(),
            ),
        ];
        for (kind, required, err) in cases {
            assert_eq!(first_missing(err), (kind, required[0].to_string()));
        }

        assert_eq!(RemoveData::new(DataId::new()).kind(), RemoveData::KIND);
        assert_eq!(AddData::new(table("d")).kind(), AddData::KIND);
    }

    #[test]
    fn test_add_data_undo_redo() {
        let mut stack = CommandStack::new(DataCollection::new());
        let d1 = table("d1");
        let id = d1.id();
        stack
            .do_command(Box::new(AddData::from_args(DataArgs::new().with("data", CommandValue::Data(Box::new(d1)))).unwrap()))
            .unwrap();
        stack.do_command(Box::new(AddData::new(table("d2")))).unwrap();

        stack.undo().unwrap();
        stack.redo().unwrap();
        assert_eq!(stack.session().len(), 2);

        stack.undo().unwrap();
        stack.undo().unwrap();
        assert!(stack.session().is_empty());
        assert!(matches!(stack.undo(), Err(CommandError::EmptyUndoStack)));

        stack.redo().unwrap();
        assert!(stack.session().contains(id));
    }

    #[test]
    fn test_remove_data_restores_links() {
        let mut dc = DataCollection::new();
        let d1 = dc.append(table("d1")).unwrap();
        let d2 = dc.append(table("d2")).unwrap();
        let x1 = dc.data(d1).unwrap().id_for("x").unwrap();
        let x2 = dc.data(d2).unwrap().id_for("x").unwrap();
        dc.add_link(Link::same(x1, x2).unwrap()).unwrap();

        let mut stack = CommandStack::new(dc);
        stack.do_command(Box::new(RemoveData::new(d1))).unwrap();
        assert_eq!(stack.session().external_links().count(), 0);

        stack.undo().unwrap();
        assert_eq!(stack.session().ids(), vec![d1, d2]);
        assert!(stack.session().get_data(d2, x1, None).is_ok());
    }

    #[test]
    fn test_failed_undo_keeps_removed_data() {
        let mut dc = DataCollection::new();
        let d1 = dc.append(table("d1")).unwrap();
        let d2 = dc.append(table("d2")).unwrap();
        let x1 = dc.data(d1).unwrap().id_for("x").unwrap();
        let x2 = dc.data(d2).unwrap().id_for("x").unwrap();
        dc.add_link(Link::same(x1, x2).unwrap()).unwrap();

        let mut command = RemoveData::new(d1);
        command.execute(&mut dc).unwrap();
        let removed_d2 = dc.remove(d2).unwrap();

        assert!(matches!(command.undo(&mut dc), Err(CommandError::Failed { .. })));
        assert!(dc.is_empty());

        dc.restore(removed_d2).unwrap();
        command.undo(&mut dc).unwrap();
        assert_eq!(dc.ids(), vec![d1, d2]);
        assert!(dc.is_resolvable(d2, x1));
    }

    #[test]
    fn test_add_link_undo_redo() {
        let mut dc = DataCollection::new();
        let d1 = dc.append(table("d1")).unwrap();
        let d2 = dc.append(table("d2")).unwrap();
        let x1 = dc.data(d1).unwrap().id_for("x").unwrap();
        let x2 = dc.data(d2).unwrap().id_for("x").unwrap();

        let mut stack = CommandStack::new(dc);
        stack.do_command(Box::new(AddLink::new(Link::same(x1, x2).unwrap()))).unwrap();
        assert!(stack.session().is_resolvable(d2, x1));

        stack.undo().unwrap();
        assert!(!stack.session().is_resolvable(d2, x1));

        stack.redo().unwrap();
        assert!(stack.session().is_resolvable(d2, x1));
    }

    #[test]
    fn test_subset_commands() {
        let mut dc = DataCollection::new();
        let d1 = dc.append(table("d1")).unwrap();
        let x = dc.data(d1).unwrap().id_for("x").unwrap();
        let mut stack = CommandStack::new(dc);

        let args = DataArgs::new()
            .with("data", CommandValue::DataId(d1))
            .with("label", CommandValue::Label("low".into()))
            .with("state", CommandValue::State(SubsetState::range(x, 0.0, 1.0)));
        stack.do_command(Box::new(NewSubset::from_args(args).unwrap())).unwrap();
        let subset = stack.session().subsets_of(d1).unwrap()[0].id();

        let apply = DataArgs::new()
            .with("subset", CommandValue::SubsetId(subset))
            .with("state", CommandValue::State(SubsetState::range(x, 3.0, 3.0)))
            .with("mode", CommandValue::Mode(CombineMode::Or));
        stack.do_command(Box::new(ApplySubsetState::from_args(apply).unwrap())).unwrap();

        let mask = |stack: &CommandStack<DataCollection>| {
            stack
                .session()
                .subset_mask(subset, d1, None)
                .unwrap()
                .iter()
                .copied()
                .collect::<Vec<_>>()
        };
        assert_eq!(mask(&stack), vec![true, false, true]);

        stack.undo().unwrap();
        assert_eq!(mask(&stack), vec![true, false, false]);

        stack.undo().unwrap();
        assert!(stack.session().subsets_of(d1).unwrap().is_empty());

        stack.redo().unwrap();
        stack.redo().unwrap();
        assert_eq!(mask(&stack), vec![true, false, true]);
    }
}
