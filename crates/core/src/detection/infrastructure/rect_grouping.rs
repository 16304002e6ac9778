use crate::shared::bounding_box::BoundingBox;

/// Relative tolerance for two raw hits to belong to the same object.
pub const GROUP_EPS: f64 = 0.2;

/// Clusters raw sliding-window hits and averages each cluster.
///
/// Clusters with `min_neighbors` or fewer members are discarded, and a
/// cluster lying inside a much better supported one is dropped as well.
/// `min_neighbors == 0` returns the hits unchanged.
pub fn group_rectangles(rects: &[BoundingBox], min_neighbors: u32, eps: f64) -> Vec<BoundingBox> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let labels = partition(rects, eps);
    let classes = labels.iter().copied().max().map_or(0, |m| m + 1);

    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0u32; classes];
    for (r, &label) in rects.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.width as i64;
        s[3] += r.height as i64;
        counts[label] += 1;
    }

    let clusters: Vec<(BoundingBox, u32)> = sums
        .iter()
        .zip(&counts)
        .filter(|&(_, &n)| n > min_neighbors)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            (BoundingBox::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3])), n)
        })
        .collect();

    clusters
        .iter()
        .enumerate()
        .filter(|&(i, &(r1, n1))| {
            !clusters.iter().enumerate().any(|(j, &(r2, n2))| {
                i != j && (n2 > n1.max(3) || n1 < 3) && is_inside(&r1, &r2, eps)
            })
        })
        .map(|(_, &(r, _))| r)
        .collect()
}

fn is_inside(inner: &BoundingBox, outer: &BoundingBox, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i32;
    let dy = (outer.height as f64 * eps).round() as i32;
    inner.x >= outer.x - dx
        && inner.y >= outer.y - dy
        && inner.right() <= outer.right() + dx
        && inner.bottom() <= outer.bottom() + dy
}

fn similar(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

/// Union-find over the similarity relation; returns dense class labels.
fn partition(rects: &[BoundingBox], eps: f64) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..rects.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rects.len() {
        for j in i + 1..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut dense = vec![usize::MAX; rects.len()];
    let mut next = 0;
    (0..rects.len())
        .map(|i| {
            let r = root(&mut parent, i);
            if dense[r] == usize::MAX {
                dense[r] = next;
                next += 1;
            }
            dense[r]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    #[test]
    fn test_zero_neighbors_returns_raw_hits() {
        let raw = vec![bbox(0, 0, 10, 10), bbox(1, 1, 10, 10)];
        assert_eq!(group_rectangles(&raw, 0, GROUP_EPS), raw);
    }

    #[test]
    fn test_cluster_is_averaged() {
        let raw = vec![
            bbox(100, 100, 40, 40),
            bbox(102, 101, 40, 40),
            bbox(98, 99, 42, 42),
            bbox(100, 100, 38, 38),
        ];
        let grouped = group_rectangles(&raw, 3, GROUP_EPS);
        assert_eq!(grouped, vec![bbox(100, 100, 40, 40)]);
    }

    #[test]
    fn test_sparse_cluster_is_dropped() {
        let raw = vec![bbox(100, 100, 40, 40), bbox(101, 100, 40, 40)];
        assert!(group_rectangles(&raw, 3, GROUP_EPS).is_empty());
    }

    #[test]
    fn test_distinct_objects_stay_separate() {
        let mut raw = Vec::new();
        for d in 0..3 {
            raw.push(bbox(10 + d, 10, 30, 30));
            raw.push(bbox(200 + d, 50, 30, 30));
        }
        let grouped = group_rectangles(&raw, 2, GROUP_EPS);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_weak_nested_cluster_is_removed() {
        let mut raw = Vec::new();
        // strong outer face, 6 hits
        for d in 0..6 {
            raw.push(bbox(100 + d % 2, 100, 80, 80));
        }
        // weak small hit cluster inside it, 2 hits
        raw.push(bbox(120, 120, 20, 20));
        raw.push(bbox(121, 120, 20, 20));
        let grouped = group_rectangles(&raw, 1, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].width, 80);
    }
}
