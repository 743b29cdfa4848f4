//! Automatic casting of `gt_bboxes` around box-aware transforms.

use super::{BoxField, BoxRepr, BoxTypeRegistry};
use crate::error::DetError;
use crate::pipeline::{Results, Transform};

/// A destination box type that transforms can be wrapped with.
///
/// Build one per destination type with [`BoxCast::new`], then wrap any number
/// of transforms with [`BoxCast::wrap`]. A wrapped transform sees
/// `gt_bboxes` as the destination representation; whatever representation
/// it leaves behind is exported back to a raw array before returning, so the
/// next transform in a pipeline gets the same shape it would have without
/// the wrapper.
#[derive(Clone, Debug)]
pub struct BoxCast {
    name: String,
    repr: BoxRepr,
}

impl BoxCast {
    /// Resolves `dst` once. Unknown names fail here, not at transform time.
    pub fn new(registry: &BoxTypeRegistry, dst: &str) -> Result<Self, DetError> {
        let (name, repr) = registry.resolve(dst)?;
        Ok(Self { name, repr })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repr(&self) -> BoxRepr {
        self.repr
    }

    /// Wraps `inner` so it runs on the destination representation.
    pub fn wrap<T: Transform>(&self, inner: T) -> Cast<T> {
        Cast {
            cast: self.clone(),
            inner,
        }
    }

    fn lift(&self, field: &mut Option<BoxField>) -> Result<(), DetError> {
        *field = match field.take() {
            Some(BoxField::Raw(raw)) => Some(BoxField::Typed(self.repr.build(raw)?)),
            other => other,
        };
        Ok(())
    }
}

fn lower(field: &mut Option<BoxField>) {
    *field = field.take().map(|field| match field {
        BoxField::Typed(boxes) => BoxField::Raw(boxes.into_raw()),
        raw => raw,
    });
}

/// A transform wrapped by [`BoxCast::wrap`].
#[derive(Clone, Debug)]
pub struct Cast<T> {
    cast: BoxCast,
    inner: T,
}

impl<T> Cast<T> {
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transform> Transform for Cast<T> {
    fn transform(&self, mut results: Results) -> Result<Option<Results>, DetError> {
        // Records without boxes, or already holding a typed list, pass
        // through untouched and are not converted back afterwards.
        if !matches!(results.gt_bboxes, Some(BoxField::Raw(_))) {
            return self.inner.transform(results);
        }

        self.cast.lift(&mut results.gt_bboxes)?;
        // Mixed records follow the same rule, one by one.
        let mut lifted = Vec::with_capacity(results.mix_results.len());
        for mixed in &mut results.mix_results {
            let raw = matches!(mixed.gt_bboxes, Some(BoxField::Raw(_)));
            if raw {
                self.cast.lift(&mut mixed.gt_bboxes)?;
            }
            lifted.push(raw);
        }

        let output = self.inner.transform(results)?;
        Ok(output.map(|mut results| {
            lower(&mut results.gt_bboxes);
            for (mixed, &raw) in results.mix_results.iter_mut().zip(&lifted) {
                if raw {
                    lower(&mut mixed.gt_bboxes);
                }
            }
            results
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{HorizontalBoxes, RawBoxes};
    use crate::pipeline::from_fn;

    fn record_with_raw_boxes() -> Results {
        Results {
            gt_bboxes: Some(BoxField::Raw(RawBoxes::from_rows(&[[0.0, 0.0, 10.0, 5.0]]))),
            ..Default::default()
        }
    }

    #[test]
    fn wrapped_transform_sees_typed_boxes() {
        let registry = BoxTypeRegistry::with_defaults();
        let cast = BoxCast::new(&registry, "hbox").expect("hbox registered");

        let flip = cast.wrap(from_fn(|mut results: Results| {
            let boxes = results
                .gt_bboxes
                .as_mut()
                .and_then(BoxField::as_typed_mut)
                .ok_or_else(|| DetError::InvalidInput("expected typed boxes".into()))?;
            boxes.flip_horizontal(100.0);
            Ok(Some(results))
        }));

        let out = flip
            .transform(record_with_raw_boxes())
            .expect("transform")
            .expect("kept");
        let raw = out.gt_bboxes.as_ref().and_then(BoxField::as_raw).expect("raw again");
        assert_eq!(raw.row(0), &[90.0, 0.0, 100.0, 5.0]);
    }

    #[test]
    fn mixed_records_are_cast_alongside() {
        let registry = BoxTypeRegistry::with_defaults();
        let cast = BoxCast::new(&registry, "hbox").expect("hbox registered");

        let check = cast.wrap(from_fn(|results: Results| {
            let typed: Vec<bool> = results
                .mix_results
                .iter()
                .map(|mixed| {
                    mixed
                        .gt_bboxes
                        .as_ref()
                        .and_then(|field| field.downcast_ref::<HorizontalBoxes>())
                        .is_some()
                })
                .collect();
            if typed != [true, true] {
                return Err(DetError::InvalidInput("mixed boxes not typed".into()));
            }
            Ok(Some(results))
        }));

        let mut results = record_with_raw_boxes();
        results.mix_results = vec![
            record_with_raw_boxes(),
            Results {
                gt_bboxes: Some(BoxField::Typed(Box::new(HorizontalBoxes::from_xyxy(&[[
                    1.0, 2.0, 3.0, 4.0,
                ]])))),
                ..Default::default()
            },
        ];

        let out = check.transform(results).expect("transform").expect("kept");
        let mixed = &out.mix_results;
        let raw = mixed[0].gt_bboxes.as_ref().and_then(BoxField::as_raw).expect("raw again");
        assert_eq!(raw.row(0), &[0.0, 0.0, 10.0, 5.0]);
        assert!(mixed[1]
            .gt_bboxes
            .as_ref()
            .and_then(|field| field.downcast_ref::<HorizontalBoxes>())
            .is_some());
    }

    #[test]
    fn unknown_destination_fails_up_front() {
        let registry = BoxTypeRegistry::with_defaults();
        assert!(matches!(
            BoxCast::new(&registry, "nope"),
            Err(DetError::NotRegistered(_))
        ));
    }

    #[test]
    fn typed_input_is_left_typed() {
        let registry = BoxTypeRegistry::with_defaults();
        let cast = BoxCast::new(&registry, "hbox").expect("hbox registered");
        let identity = cast.wrap(from_fn(|results: Results| Ok(Some(results))));

        let results = Results {
            gt_bboxes: Some(BoxField::Typed(Box::new(HorizontalBoxes::from_xyxy(&[[
                1.0, 2.0, 3.0, 4.0,
            ]])))),
            ..Default::default()
        };

        let out = identity.transform(results).expect("transform").expect("kept");
        assert!(out
            .gt_bboxes
            .as_ref()
            .and_then(|field| field.downcast_ref::<HorizontalBoxes>())
            .is_some());
    }
}
