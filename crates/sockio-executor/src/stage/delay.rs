//! Delay stage: polls delayed operations

use sockio_core::{ktrace, SockResult, SocketId};

use crate::control::RequestControl;
use crate::descriptor::RequestDescriptor;
use crate::operation::Operation;
use crate::pipeline::Pipeline;

/// Keep descriptors whose operation is not held back by a predicate
pub(crate) fn delay(p: &mut Pipeline, ids: Vec<SocketId>) -> SockResult<Vec<SocketId>> {
    p.delayed_waiting = false;
    let mut ready = Vec::with_capacity(ids.len());

    for id in ids {
        let held = p
            .bag
            .get(id)
            .is_some_and(|d| matches!(d.operation, Operation::Delayed(_)));
        if !held {
            ready.push(id);
            continue;
        }

        match p.with_descriptor(id, |p, desc| Ok(poll(p, desc)))? {
            Some(true) => p.delayed_waiting = true,
            Some(false) => ready.push(id),
            None => {}
        }
    }
    Ok(ready)
}

/// `true` while the predicate still holds the operation back
fn poll(p: &mut Pipeline, desc: &mut RequestDescriptor) -> bool {
    while let Operation::Delayed(delayed) = &mut desc.operation {
        let mut control = RequestControl::new(&mut p.bag, &mut p.state);
        if (delayed.predicate)(&mut *desc.socket, &mut control) {
            return true;
        }
        if let Operation::Delayed(delayed) = std::mem::take(&mut desc.operation) {
            ktrace!("delay: {} released", desc.id);
            desc.operation = *delayed.inner;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::testing::MockSocket;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_predicate_gates_operation() {
        let mut p = Pipeline::new(ExecutorConfig::new());
        let polls = Rc::new(Cell::new(0));
        let counter = polls.clone();
        let op = Operation::delayed(Operation::write("late"), move |_, _| {
            counter.set(counter.get() + 1);
            counter.get() < 3
        });
        let id = p.bag.add_socket(Box::new(MockSocket::new()), op, None, None).unwrap();

        assert!(delay(&mut p, vec![id]).unwrap().is_empty());
        assert!(p.delayed_waiting);
        assert!(delay(&mut p, vec![id]).unwrap().is_empty());

        assert_eq!(delay(&mut p, vec![id]).unwrap(), vec![id]);
        assert!(!p.delayed_waiting);
        assert!(matches!(p.bag.get(id).unwrap().operation, Operation::Write(_)));
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn test_nested_delays_unwrap_in_one_pass() {
        let mut p = Pipeline::new(ExecutorConfig::new());
        let op = Operation::delayed(Operation::delayed(Operation::Null, |_, _| false), |_, _| false);
        let id = p.bag.add_socket(Box::new(MockSocket::new()), op, None, None).unwrap();

        assert_eq!(delay(&mut p, vec![id]).unwrap(), vec![id]);
        assert!(p.bag.get(id).unwrap().operation.is_null());
    }
}
