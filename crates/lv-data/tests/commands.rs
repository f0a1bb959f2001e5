use lv_core::{CommandError, CommandStack};
use lv_data::{AddData, AddLink, Data, DataCollection, Link, NewSubset, SubsetState};

fn table(label: &str, values: Vec<f64>) -> Data {
    Data::from_columns(label, vec![("v", values)]).unwrap()
}

fn labels(dc: &DataCollection) -> Vec<String> {
    dc.iter().map(|d| d.label().to_string()).collect()
}

#[test]
fn test_add_undo_redo_scenario() {
    let x = table("x", vec![1.0]);
    let y = table("y", vec![2.0]);
    let (x_id, y_id) = (x.id(), y.id());

    let mut reference = CommandStack::new(DataCollection::new());
    reference.do_command(Box::new(AddData::new(x.clone()))).unwrap();
    reference.do_command(Box::new(AddData::new(y.clone()))).unwrap();

    let mut stack = CommandStack::new(DataCollection::new());
    stack.do_command(Box::new(AddData::new(x))).unwrap();
    stack.do_command(Box::new(AddData::new(y))).unwrap();
    stack.undo().unwrap();
    assert_eq!(stack.session().ids(), vec![x_id]);
    stack.redo().unwrap();

    assert_eq!(stack.session().ids(), reference.session().ids());
    assert_eq!(labels(stack.session()), labels(reference.session()));
    assert_eq!(stack.session().ids(), vec![x_id, y_id]);

    stack.undo().unwrap();
    stack.undo().unwrap();
    assert!(stack.session().is_empty());
    assert!(matches!(stack.undo(), Err(CommandError::EmptyUndoStack)));
}

#[test]
fn test_new_command_clears_redo() {
    let mut stack = CommandStack::new(DataCollection::new());
    stack.do_command(Box::new(AddData::new(table("x", vec![1.0])))).unwrap();
    stack.undo().unwrap();
    assert!(stack.can_redo());

    stack.do_command(Box::new(AddData::new(table("y", vec![2.0])))).unwrap();
    assert!(!stack.can_redo());
    assert!(matches!(stack.redo(), Err(CommandError::EmptyRedoStack)));
}

#[test]
fn test_mixed_commands_unwind_in_order() {
    let x = table("x", vec![1.0, 2.0]);
    let y = table("y", vec![3.0, 4.0]);
    let (x_id, y_id) = (x.id(), y.id());
    let xv = x.id_for("v").unwrap();
    let yv = y.id_for("v").unwrap();

    let mut stack = CommandStack::new(DataCollection::new());
    stack.do_command(Box::new(AddData::new(x))).unwrap();
    stack.do_command(Box::new(AddData::new(y))).unwrap();
    stack
        .do_command(Box::new(AddLink::new(Link::same(xv, yv).unwrap())))
        .unwrap();
    stack
        .do_command(Box::new(NewSubset::new(y_id, "high", SubsetState::range(xv, 1.5, 10.0))))
        .unwrap();

    let dc = stack.session();
    let subset = dc.subsets_of(y_id).unwrap()[0].id();
    assert_eq!(dc.subset_mask(subset, y_id, None).unwrap().iter().filter(|v| **v).count(), 2);

    stack.undo().unwrap();
    assert!(stack.session().subsets_of(y_id).unwrap().is_empty());
    stack.undo().unwrap();
    assert!(!stack.session().is_resolvable(y_id, xv));
    stack.undo().unwrap();
    stack.undo().unwrap();
    assert!(stack.session().is_empty());

    while stack.can_redo() {
        stack.redo().unwrap();
    }
    let dc = stack.session();
    assert_eq!(dc.ids(), vec![x_id, y_id]);
    assert!(dc.is_resolvable(y_id, xv));
    assert_eq!(dc.subsets_of(y_id).unwrap().len(), 1);
}
