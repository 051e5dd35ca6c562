use glam::Vec3;
use scene::{Geometry, SdfNode};

fn random_vec(rng: &fastrand::Rng, scale: f32) -> Vec3 {
    Vec3::new(rng.f32() - 0.5, rng.f32() - 0.5, rng.f32() - 0.5) * scale
}

fn random_leaf(rng: &fastrand::Rng) -> SdfNode {
    let geometry = Geometry::ALL[rng.usize(..Geometry::ALL.len())];
    let dims = Vec3::new(0.1 + rng.f32(), 0.05 + rng.f32() * 0.5, 0.1 + rng.f32());
    SdfNode::primitive(geometry, random_vec(rng, 4.0), dims)
}

fn random_tree(rng: &fastrand::Rng, depth: usize) -> SdfNode {
    if depth <= 1 || rng.u8(..4) == 0 {
        return random_leaf(rng);
    }
    let children = (0..rng.usize(1..4)).map(|_| random_tree(rng, depth - 1)).collect();
    SdfNode::Union(children)
}

fn leaves<'a>(node: &'a SdfNode, out: &mut Vec<&'a SdfNode>) {
    if matches!(node, SdfNode::Primitive(_)) {
        out.push(node);
    }
    for child in node.children() {
        leaves(child, out);
    }
}

#[test]
fn union_never_exceeds_any_leaf() {
    let rng = fastrand::Rng::with_seed(7);
    for _ in 0..64 {
        let tree = random_tree(&rng, 6);
        assert!(tree.validate().is_ok());

        let mut leaf_nodes = Vec::new();
        leaves(&tree, &mut leaf_nodes);

        for _ in 0..32 {
            let p = random_vec(&rng, 8.0);
            let d = tree.distance(p);
            for leaf in &leaf_nodes {
                assert!(d <= leaf.distance(p) + 1e-6);
            }
        }
    }
}

#[test]
fn smooth_union_is_bounded_by_plain_union() {
    let rng = fastrand::Rng::with_seed(11);
    for _ in 0..32 {
        let children: Vec<SdfNode> = (0..3).map(|_| random_leaf(&rng)).collect();
        let hard = SdfNode::Union(children.clone());
        let soft = SdfNode::SmoothUnion { k: 0.3, children };
        for _ in 0..16 {
            let p = random_vec(&rng, 6.0);
            assert!(soft.distance(p) <= hard.distance(p) + 1e-5);
        }
    }
}
