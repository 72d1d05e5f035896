pub(crate) mod spin_lock;
