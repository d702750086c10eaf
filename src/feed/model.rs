/// One fetched, recency-filtered and cleaned syndication source.
///
/// Built once by [`FeedParser`](super::FeedParser); there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    title: String,
    description: String,
    url: String,
    entries: Vec<Entry>,
}

impl Feed {
    pub(crate) fn new(title: String, description: String, url: String, entries: Vec<Entry>) -> Self {
        Self {
            title,
            description,
            url,
            entries,
        }
    }

    /// Cleaned feed title, empty when the source had none.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Cleaned feed description, empty when the source had none.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Source URL as reported by the feed itself (or the final URL after redirects).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Surviving entries in the order the feed listed them.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

/// A single cleaned feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    title: String,
    content: String,
}

impl Entry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Entries grouped under caller-chosen keys, in insertion order.
///
/// This is the input of [`FeedFormatter`](crate::render::FeedFormatter). Keys are
/// unique: inserting an existing key replaces its entries without moving it.
/// Keys become chapter labels; the formatter replaces characters outside
/// `[A-Za-z0-9._:-]` with `-`, so keys should stick to that set to stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCollection {
    groups: Vec<(String, Vec<Entry>)>,
}

impl FeedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entries` under `key`, returning the entries previously stored there.
    pub fn insert(&mut self, key: impl Into<String>, entries: Vec<Entry>) -> Option<Vec<Entry>> {
        let key = key.into();
        match self.groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, entries)),
            None => {
                self.groups.push((key, entries));
                None
            }
        }
    }

    /// Stores a fetched feed's entries under `key`.
    pub fn insert_feed(&mut self, key: impl Into<String>, feed: Feed) -> Option<Vec<Entry>> {
        self.insert(key, feed.into_entries())
    }

    pub fn get(&self, key: &str) -> Option<&[Entry]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
        self.groups
            .iter()
            .map(|(key, entries)| (key.as_str(), entries.as_slice()))
    }

    /// Number of keys (not entries).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_preserves_insertion_order() {
        let mut feeds = FeedCollection::new();
        feeds.insert("zeta", vec![Entry::new("z", "")]);
        feeds.insert("alpha", vec![Entry::new("a", "")]);
        feeds.insert("mid", vec![]);

        let keys: Vec<&str> = feeds.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(feeds.len(), 3);
        assert_eq!(feeds.entry_count(), 2);
    }

    #[test]
    fn test_reinserting_key_replaces_in_place() {
        let mut feeds = FeedCollection::new();
        feeds.insert("a", vec![Entry::new("old", "")]);
        feeds.insert("b", vec![]);

        let previous = feeds.insert("a", vec![Entry::new("new", ""), Entry::new("newer", "")]);
        assert_eq!(previous, Some(vec![Entry::new("old", "")]));

        let keys: Vec<&str> = feeds.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(feeds.get("a").map(|e| e.len()), Some(2));
    }

    #[test]
    fn test_insert_feed_keeps_entry_order() {
        let feed = Feed::new(
            "Title".into(),
            String::new(),
            "https://example.com".into(),
            vec![Entry::new("first", "1"), Entry::new("second", "2")],
        );
        let mut feeds = FeedCollection::new();
        assert!(feeds.insert_feed("k", feed).is_none());

        let titles: Vec<&str> = feeds.get("k").unwrap().iter().map(Entry::title).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_collection() {
        let feeds = FeedCollection::new();
        assert!(feeds.is_empty());
        assert_eq!(feeds.get("missing"), None);
        assert_eq!(feeds.entry_count(), 0);
    }
}
