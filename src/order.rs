/// Assigns emission ranks to mapping keys.
///
/// Keys listed up front get negative ranks in their declared order, so they
/// always sort before anything else. Every other key gets the next positive
/// rank each time it is asked for; callers ask once per key per mapping.
#[derive(Debug, Clone, Default)]
pub struct Order {
    predefined: Vec<String>,
    counter: i64,
}

impl Order {
    pub fn new<I, S>(predefined: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predefined: predefined.into_iter().map(Into::into).collect(),
            counter: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> i64 {
        if let Some(index) = self.predefined.iter().position(|k| k == key) {
            return index as i64 - self.predefined.len() as i64;
        }
        self.counter += 1;
        self.counter
    }
}
