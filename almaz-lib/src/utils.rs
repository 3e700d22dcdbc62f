//! contains small utility functions that have nowhere else to go

use once_cell::sync::Lazy;

static VERSION: Lazy<[u16; 3]> = Lazy::new(|| {
    let mut parts = env!("CARGO_PKG_VERSION")
        .split('.')
        .map(|x| x.parse::<u16>().unwrap_or(0));
    [(); 3].map(|_| parts.next().unwrap_or(0))
});

/// returns the crate version
pub fn get_version() -> [u16; 3] {
    *VERSION
}

/// collects an iterator of results, stopping at the first error
pub fn sequence_result<Iter, Itt, T, E>(results: Iter) -> Result<Vec<T>, E>
where
    Iter: IntoIterator<Item = Result<T, E>, IntoIter = Itt>,
    Itt: Iterator<Item = Result<T, E>>,
{
    let mut res = vec![];
    for r in results {
        res.push(r?);
    }

    Ok(res)
}
