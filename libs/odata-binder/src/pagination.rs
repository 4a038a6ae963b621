//! `$skip` / `$top`.

use crate::Error;

/// Skip is always applied before top; `None` leaves that stage out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub top: Option<u64>,
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl Pagination {
    #[must_use]
    pub fn new(skip: Option<u64>, top: Option<u64>) -> Self {
        Self { skip, top }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.skip.is_none() && self.top.is_none()
    }

    /// Apply to an infallible sequence.
    pub fn apply<I: IntoIterator>(
        self,
        seq: I,
    ) -> std::iter::Take<std::iter::Skip<I::IntoIter>> {
        seq.into_iter()
            .skip(self.skip.map_or(0, to_usize))
            .take(self.top.map_or(usize::MAX, to_usize))
    }

    /// Apply to a fallible sequence: errors pass through uncounted.
    pub(crate) fn apply_fallible<I>(self, inner: I) -> Paginate<I> {
        Paginate {
            inner,
            skip: self.skip.map_or(0, to_usize),
            remaining: self.top.map(to_usize),
        }
    }
}

/// Pagination over `Result` items. Stops pulling once `top` is exhausted.
#[derive(Clone, Debug)]
pub struct Paginate<I> {
    inner: I,
    skip: usize,
    remaining: Option<usize>,
}

impl<I, T> Iterator for Paginate<I>
where
    I: Iterator<Item = Result<T, Error>>,
{
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }
            let item = self.inner.next()?;
            if item.is_err() {
                return Some(item);
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Some(item);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn skip_then_top() {
        let p = Pagination::new(Some(4), Some(4));
        let out: Vec<_> = p.apply(0..12).collect();
        assert_eq!(out, [4, 5, 6, 7]);

        let past_end: Vec<_> = Pagination::new(Some(20), None).apply(0..12).collect();
        assert!(past_end.is_empty());

        let all: Vec<_> = Pagination::default().apply(0..3).collect();
        assert_eq!(all, [0, 1, 2]);
        assert!(Pagination::default().is_noop());
    }

    #[test]
    fn fallible_items_pass_errors_without_counting_them() {
        let items = vec![
            Ok(1),
            Err(Error::Evaluation("boom".to_owned())),
            Ok(2),
            Ok(3),
            Ok(4),
        ];
        let out: Vec<_> = Pagination::new(Some(1), Some(2))
            .apply_fallible(items.into_iter())
            .collect();
        assert_eq!(
            out,
            vec![Err(Error::Evaluation("boom".to_owned())), Ok(2), Ok(3)]
        );
    }

    #[test]
    fn stops_pulling_after_top() {
        let mut pulled = 0;
        let source = std::iter::from_fn(|| {
            pulled += 1;
            Some(Ok::<_, Error>(pulled))
        });
        let out: Vec<_> = Pagination::new(None, Some(3))
            .apply_fallible(source)
            .collect();
        assert_eq!(out.len(), 3);
        assert_eq!(pulled, 3);
    }
}
