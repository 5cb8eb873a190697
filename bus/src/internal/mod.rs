pub(crate) mod message_queue;
pub(crate) mod waiter;
