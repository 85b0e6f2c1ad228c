// src/ui/compose.rs
use crate::core::gfx::{ObjectType, RenderList, RenderObject};
use crate::core::space::Rect;
use crate::ui::actors::{Actor, SpriteSource};
use cgmath::{Matrix4, Vector3};

/* ======================= RENDERER SCREEN BUILDER ======================= */

/// Flattens an actor tree into draw order. Offsets are top-left relative to
/// the parent frame; `root` is the window.
pub fn build_screen(actors: &[Actor], clear_color: [f32; 4], root: Rect) -> RenderList {
    let mut objects = Vec::with_capacity(estimate_object_count(actors));
    let mut order_counter: u32 = 0;

    for actor in actors {
        build_actor_recursive(actor, [root.x, root.y], None, 0, &mut order_counter, &mut objects);
    }

    objects.sort_by_key(|o| (o.z, o.order));
    RenderList { clear_color, objects }
}

fn estimate_object_count(actors: &[Actor]) -> usize {
    let mut stack: Vec<&Actor> = actors.iter().collect();
    let mut total = 0usize;
    while let Some(a) = stack.pop() {
        match a {
            Actor::Sprite { visible, .. } => total += *visible as usize,
            Actor::Frame { children, background, .. } => {
                total += background.is_some() as usize;
                stack.extend(children.iter());
            }
        }
    }
    total
}

/* ======================= ACTOR -> OBJECT CONVERSION ======================= */

fn build_actor_recursive(
    actor: &Actor,
    origin: [f32; 2],
    clip: Option<Rect>,
    base_z: i16,
    order_counter: &mut u32,
    out: &mut Vec<RenderObject>,
) {
    match actor {
        Actor::Sprite { offset, size, source, tint, z, visible } => {
            if !*visible {
                return;
            }
            let rect = Rect { x: origin[0] + offset[0], y: origin[1] + offset[1], w: size[0], h: size[1] };
            if is_culled(rect, clip) {
                return;
            }
            let object_type = match source {
                SpriteSource::Solid => ObjectType::Solid { color: *tint },
                SpriteSource::Texture(key) => ObjectType::Sprite { texture_id: key.clone(), tint: *tint },
            };
            push(out, object_type, rect, clip, base_z.saturating_add(*z), order_counter);
        }

        Actor::Frame { offset, size, children, background, z, clip: clips } => {
            let rect = Rect { x: origin[0] + offset[0], y: origin[1] + offset[1], w: size[0], h: size[1] };
            let layer = base_z.saturating_add(*z);
            let inner_clip = if *clips {
                Some(clip.map_or(rect, |c| c.intersect(&rect)))
            } else {
                clip
            };

            if let Some(color) = background {
                if !is_culled(rect, inner_clip) {
                    push(out, ObjectType::Solid { color: *color }, rect, inner_clip, layer, order_counter);
                }
            }
            for child in children {
                build_actor_recursive(child, [rect.x, rect.y], inner_clip, layer, order_counter, out);
            }
        }
    }
}

#[inline(always)]
fn is_culled(rect: Rect, clip: Option<Rect>) -> bool {
    if rect.w <= 0.0 || rect.h <= 0.0 {
        return true;
    }
    clip.is_some_and(|c| {
        let i = c.intersect(&rect);
        i.w <= 0.0 || i.h <= 0.0
    })
}

#[inline(always)]
fn push(
    out: &mut Vec<RenderObject>,
    object_type: ObjectType,
    rect: Rect,
    clip: Option<Rect>,
    z: i16,
    order_counter: &mut u32,
) {
    // Backends draw a unit quad spanning (0,0)..(1,1).
    let transform = Matrix4::from_translation(Vector3::new(rect.x, rect.y, 0.0))
        * Matrix4::from_nonuniform_scale(rect.w, rect.h, 1.0);
    let order = *order_counter;
    *order_counter += 1;
    out.push(RenderObject {
        object_type,
        transform,
        clip: clip.map(|c| [c.x, c.y, c.w, c.h]),
        z,
        order,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::actors;
    use cgmath::{Vector4, vec4};

    const WINDOW: Rect = Rect { x: 0.0, y: 0.0, w: 800.0, h: 600.0 };

    fn corners(o: &RenderObject) -> ([f32; 2], [f32; 2]) {
        let tl: Vector4<f32> = o.transform * vec4(0.0, 0.0, 0.0, 1.0);
        let br: Vector4<f32> = o.transform * vec4(1.0, 1.0, 0.0, 1.0);
        ([tl.x, tl.y], [br.x, br.y])
    }

    #[test]
    fn frames_offset_their_children() {
        let tree = vec![actors::surface(100.0, 50.0, 200.0, 200.0, [0.0; 4], vec![
            actors::quad(10.0, 20.0, 30.0, 40.0, [1.0; 4], 1),
        ])];
        let list = build_screen(&tree, [0.0; 4], WINDOW);
        // transparent background is still an object
        assert_eq!(list.objects.len(), 2);
        let quad = &list.objects[1];
        assert_eq!(corners(quad), ([110.0, 70.0], [140.0, 110.0]));
        assert_eq!(quad.clip, Some([100.0, 50.0, 200.0, 200.0]));
        assert_eq!(quad.z, 1);
    }

    #[test]
    fn fully_clipped_and_invisible_sprites_are_dropped() {
        let tree = vec![actors::surface(0.0, 0.0, 100.0, 100.0, [0.1, 0.1, 0.1, 1.0], vec![
            actors::quad(0.0, -300.0, 50.0, 50.0, [1.0; 4], 0),
            actors::quad(0.0, 0.0, 50.0, 50.0, [1.0, 1.0, 1.0, 0.0], 0),
            actors::image("a.png", 0.0, 80.0, 50.0, 50.0, 0.5, 0),
        ])];
        let list = build_screen(&tree, [0.0; 4], WINDOW);
        assert_eq!(list.objects.len(), 2);
        match &list.objects[1].object_type {
            ObjectType::Sprite { texture_id, tint } => {
                assert_eq!(texture_id, "a.png");
                assert_eq!(tint[3], 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_clips_intersect() {
        let inner = Actor::Frame {
            offset: [50.0, 50.0],
            size: [100.0, 100.0],
            children: vec![actors::quad(0.0, 0.0, 10.0, 10.0, [1.0; 4], 0)],
            background: None,
            z: 0,
            clip: true,
        };
        let tree = vec![actors::surface(0.0, 0.0, 100.0, 100.0, [0.0; 4], vec![inner])];
        let list = build_screen(&tree, [0.0; 4], WINDOW);
        assert_eq!(list.objects.last().and_then(|o| o.clip), Some([50.0, 50.0, 50.0, 50.0]));
    }

    #[test]
    fn sorted_by_layer_then_submission() {
        let tree = vec![
            actors::quad(0.0, 0.0, 1.0, 1.0, [1.0; 4], 2),
            actors::quad(0.0, 0.0, 1.0, 1.0, [1.0; 4], 0),
            actors::quad(0.0, 0.0, 1.0, 1.0, [1.0; 4], 2),
        ];
        let list = build_screen(&tree, [0.0; 4], WINDOW);
        let keys: Vec<_> = list.objects.iter().map(|o| (o.z, o.order)).collect();
        assert_eq!(keys, vec![(0, 1), (2, 0), (2, 2)]);
    }
}
