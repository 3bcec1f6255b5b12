//! This module is for testing only

use std::cell::RefCell;
use std::rc::Rc;

pub type DropFlag<T> = Rc<RefCell<T>>;

/// Lifetime bookkeeping shared by every `Tracked` value created from it.
#[derive(Debug, Default)]
pub struct Counters {
    pub constructed: usize,
    pub destroyed: usize,
    pub clones: usize,
    /// `Tracked::clone` panics when `clones` reaches this value.
    pub fail_clone_at: Option<usize>,
    /// `Tracked::try_new` fails when `constructed` reaches this value.
    pub fail_construct_at: Option<usize>,
}

impl Counters {
    pub fn shared() -> DropFlag<Counters> {
        DropFlag::new(RefCell::new(Counters::default()))
    }

    /// Constructions minus destructions.
    pub fn live(&self) -> usize {
        self.constructed - self.destroyed
    }
}

/// Value that reports its constructions, clones and destructions.
pub struct Tracked {
    pub value: i32,
    counters: DropFlag<Counters>,
}

impl Tracked {
    pub fn new(value: i32, counters: &DropFlag<Counters>) -> Tracked {
        counters.borrow_mut().constructed += 1;
        Tracked {
            value,
            counters: counters.clone(),
        }
    }

    /// Constructor that can be told to fail through `fail_construct_at`.
    pub fn try_new(value: i32, counters: &DropFlag<Counters>) -> Result<Tracked, &'static str> {
        let fail = {
            let counters = counters.borrow();
            counters.fail_construct_at == Some(counters.constructed)
        };
        if fail {
            return Err("construction failed on demand");
        }
        Ok(Tracked::new(value, counters))
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        let fail = {
            let counters = self.counters.borrow();
            counters.fail_clone_at == Some(counters.clones)
        };
        if fail {
            panic!("clone of {} failed on demand", self.value);
        }
        self.counters.borrow_mut().clones += 1;
        Tracked::new(self.value, &self.counters)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.counters.borrow_mut().destroyed += 1;
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl std::fmt::Debug for Tracked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tracked({})", self.value)
    }
}

/// Values of tracked items, in order.
pub fn values<'a>(items: impl IntoIterator<Item = &'a Tracked>) -> Vec<i32> {
    items.into_iter().map(|t| t.value).collect()
}

#[test]
fn dropflag() {
    let counters = Counters::shared();
    let tracked = Tracked::new(3, &counters);
    let copy = tracked.clone();
    assert_eq!(2, counters.borrow().live());
    assert_eq!(1, counters.borrow().clones);
    std::mem::drop(tracked);
    std::mem::drop(copy);
    assert_eq!(0, counters.borrow().live());
}

#[test]
#[should_panic(expected = "failed on demand")]
fn clone_fails_on_demand() {
    let counters = Counters::shared();
    counters.borrow_mut().fail_clone_at = Some(0);
    let tracked = Tracked::new(1, &counters);
    let _ = tracked.clone();
}

#[test]
fn construction_fails_on_demand() {
    let counters = Counters::shared();
    counters.borrow_mut().fail_construct_at = Some(1);
    let first = Tracked::try_new(1, &counters);
    assert!(first.is_ok());
    assert_eq!(Err("construction failed on demand"), Tracked::try_new(2, &counters).map(|t| t.value));
    assert_eq!(1, counters.borrow().live());
}
