/// A feed-unique, strictly increasing position of an entry in a feed.
pub type SequenceNumber = i64;

/// The number of events an aggregate instance has ever accepted. Only increases.
pub type AggregateVersion = i64;
