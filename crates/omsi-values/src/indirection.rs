//! Descriptor-driven reads, writes and snapshots.

use omsi_core::Real;

use crate::buffer::{BufferCounts, VariableBuffer};
use crate::descriptor::{IndexDescriptor, VarType};
use crate::error::{ValuesError, ValuesResult};

/// Number of slots written per storage class by [`set_omsi_value`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub reals: usize,
    pub ints: usize,
    pub bools: usize,
}

/// Write `value` into every slot named by the first `count` descriptors.
///
/// All targets are validated before the first write, so on error the buffer
/// is untouched.
pub fn set_omsi_value(
    buffer: &mut VariableBuffer,
    targets: &[IndexDescriptor],
    count: usize,
    value: Real,
) -> ValuesResult<WriteCounts> {
    if count > targets.len() {
        return Err(ValuesError::LengthMismatch {
            what: "set_omsi_value targets",
            expected: count,
            found: targets.len(),
        });
    }
    let targets = &targets[..count];
    for (position, desc) in targets.iter().enumerate() {
        match desc.ty {
            VarType::Real | VarType::Integer | VarType::Boolean => buffer.check(*desc)?,
            VarType::Unknown => return Err(ValuesError::UnknownType { position }),
            ty => {
                return Err(ValuesError::UnsupportedType {
                    ty,
                    what: "set_omsi_value",
                });
            }
        }
    }

    let mut written = WriteCounts::default();
    for desc in targets {
        buffer.write_real(*desc, value)?;
        match desc.ty {
            VarType::Real => written.reals += 1,
            VarType::Integer => written.ints += 1,
            _ => written.bools += 1,
        }
    }
    Ok(written)
}

/// Snapshot the slots named by `save_target` into a new buffer.
///
/// Each descriptor is routed to the reals / ints / bools array of the new
/// buffer by its type, filled in order with an independent running offset per
/// type. The snapshot inherits the source time.
pub fn save_omsi_values(
    src: &VariableBuffer,
    save_target: &[IndexDescriptor],
    n_reals: usize,
    n_ints: usize,
    n_bools: usize,
) -> ValuesResult<VariableBuffer> {
    let mut saved = VariableBuffer::new(BufferCounts {
        reals: n_reals,
        ints: n_ints,
        bools: n_bools,
        externs: 0,
    });
    saved.set_time(src.time());

    let (mut r, mut i, mut b) = (0, 0, 0);
    for (position, desc) in save_target.iter().enumerate() {
        src.check(*desc).map_err(|e| match desc.ty {
            VarType::Unknown => ValuesError::UnknownType { position },
            _ => e,
        })?;
        match desc.ty {
            VarType::Real => {
                let slot = next_slot(&mut r, n_reals, VarType::Real)?;
                saved.reals_mut()[slot] = src.reals()[desc.index];
            }
            VarType::Integer => {
                let slot = next_slot(&mut i, n_ints, VarType::Integer)?;
                saved.ints_mut()[slot] = src.ints()[desc.index];
            }
            VarType::Boolean => {
                let slot = next_slot(&mut b, n_bools, VarType::Boolean)?;
                saved.bools_mut()[slot] = src.bools()[desc.index];
            }
            ty => {
                return Err(ValuesError::UnsupportedType {
                    ty,
                    what: "save_omsi_values",
                });
            }
        }
    }
    Ok(saved)
}

/// Write a snapshot taken by [`save_omsi_values`] back through the same descriptors.
///
/// Descriptors and the snapshot's per-type sizes are checked before the first
/// write, so on error `dest` is untouched.
pub fn restore_omsi_values(
    dest: &mut VariableBuffer,
    save_target: &[IndexDescriptor],
    saved: &VariableBuffer,
) -> ValuesResult<()> {
    let (mut r, mut i, mut b) = (0, 0, 0);
    for (position, desc) in save_target.iter().enumerate() {
        match desc.ty {
            VarType::Real => next_slot(&mut r, saved.reals().len(), VarType::Real)?,
            VarType::Integer => next_slot(&mut i, saved.ints().len(), VarType::Integer)?,
            VarType::Boolean => next_slot(&mut b, saved.bools().len(), VarType::Boolean)?,
            VarType::Unknown => return Err(ValuesError::UnknownType { position }),
            ty => {
                return Err(ValuesError::UnsupportedType {
                    ty,
                    what: "restore_omsi_values",
                });
            }
        };
        dest.check(*desc)?;
    }

    let (mut r, mut i, mut b) = (0, 0, 0);
    for desc in save_target {
        match desc.ty {
            VarType::Real => {
                dest.reals_mut()[desc.index] = saved.reals()[r];
                r += 1;
            }
            VarType::Integer => {
                dest.ints_mut()[desc.index] = saved.ints()[i];
                i += 1;
            }
            _ => {
                dest.bools_mut()[desc.index] = saved.bools()[b];
                b += 1;
            }
        }
    }
    Ok(())
}

/// Read every descriptor widened to `Real`.
pub fn read_reals(buffer: &VariableBuffer, targets: &[IndexDescriptor]) -> ValuesResult<Vec<Real>> {
    targets.iter().map(|d| buffer.read_real(*d)).collect()
}

/// Write `values[k]` through `targets[k]`; validates everything before writing.
pub fn write_reals(
    buffer: &mut VariableBuffer,
    targets: &[IndexDescriptor],
    values: &[Real],
) -> ValuesResult<()> {
    if targets.len() != values.len() {
        return Err(ValuesError::LengthMismatch {
            what: "write_reals",
            expected: targets.len(),
            found: values.len(),
        });
    }
    for desc in targets {
        buffer.check(*desc)?;
    }
    for (desc, value) in targets.iter().zip(values) {
        buffer.write_real(*desc, *value)?;
    }
    Ok(())
}

fn next_slot(offset: &mut usize, capacity: usize, ty: VarType) -> ValuesResult<usize> {
    if *offset >= capacity {
        return Err(ValuesError::CountExceeded { ty, capacity });
    }
    let slot = *offset;
    *offset += 1;
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_buffer() -> VariableBuffer {
        let mut buf = VariableBuffer::new(BufferCounts {
            reals: 4,
            ints: 3,
            bools: 2,
            externs: 1,
        });
        buf.reals_mut().copy_from_slice(&[0.5, 1.5, 2.5, 3.5]);
        buf.ints_mut().copy_from_slice(&[10, 20, 30]);
        buf.bools_mut().copy_from_slice(&[true, false]);
        buf.set_time(4.25);
        buf
    }

    #[test]
    fn set_value_counts_each_stream() {
        let mut buf = mixed_buffer();
        let targets = [
            IndexDescriptor::real(0),
            IndexDescriptor::integer(2),
            IndexDescriptor::real(3),
            IndexDescriptor::boolean(1),
        ];
        let written = set_omsi_value(&mut buf, &targets, 4, 7.0).unwrap();
        assert_eq!(
            written,
            WriteCounts {
                reals: 2,
                ints: 1,
                bools: 1
            }
        );
        assert_eq!(buf.reals(), &[7.0, 1.5, 2.5, 7.0]);
        assert_eq!(buf.ints()[2], 7);
        assert!(buf.bools()[1]);
    }

    #[test]
    fn set_value_honours_count() {
        let mut buf = mixed_buffer();
        let targets = [IndexDescriptor::real(0), IndexDescriptor::real(1)];
        set_omsi_value(&mut buf, &targets, 1, 0.0).unwrap();
        assert_eq!(buf.reals()[0], 0.0);
        assert_eq!(buf.reals()[1], 1.5);
        assert!(set_omsi_value(&mut buf, &targets, 3, 0.0).is_err());
    }

    #[test]
    fn failed_set_leaves_buffer_untouched() {
        let mut buf = mixed_buffer();
        let before = buf.clone();
        let targets = [IndexDescriptor::real(0), IndexDescriptor::string(0)];
        let err = set_omsi_value(&mut buf, &targets, 2, 9.0).unwrap_err();
        assert!(matches!(err, ValuesError::UnsupportedType { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn save_routes_by_type() {
        let buf = mixed_buffer();
        let targets = [
            IndexDescriptor::integer(1),
            IndexDescriptor::real(2),
            IndexDescriptor::boolean(0),
            IndexDescriptor::real(0),
        ];
        let saved = save_omsi_values(&buf, &targets, 2, 1, 1).unwrap();
        assert_eq!(saved.reals(), &[2.5, 0.5]);
        assert_eq!(saved.ints(), &[20]);
        assert_eq!(saved.bools(), &[true]);
        assert_eq!(saved.time(), 4.25);
    }

    #[test]
    fn save_rejects_unknown_type_and_overflow() {
        let buf = mixed_buffer();
        let unknown = [IndexDescriptor::real(0), IndexDescriptor::new(VarType::Unknown, 0)];
        assert_eq!(
            save_omsi_values(&buf, &unknown, 2, 0, 0).unwrap_err(),
            ValuesError::UnknownType { position: 1 }
        );

        let too_many = [IndexDescriptor::real(0), IndexDescriptor::real(1)];
        assert!(matches!(
            save_omsi_values(&buf, &too_many, 1, 0, 0),
            Err(ValuesError::CountExceeded { capacity: 1, .. })
        ));
    }

    #[test]
    fn restore_checks_snapshot_size_before_writing() {
        let mut buf = mixed_buffer();
        let before = buf.clone();
        let targets = [
            IndexDescriptor::real(0),
            IndexDescriptor::integer(0),
            IndexDescriptor::real(1),
        ];
        // one real slot for two real descriptors
        let mut short = VariableBuffer::new(BufferCounts {
            reals: 1,
            ints: 1,
            bools: 0,
            externs: 0,
        });
        short.reals_mut()[0] = -1.0;
        short.ints_mut()[0] = -1;

        let err = restore_omsi_values(&mut buf, &targets, &short).unwrap_err();
        assert_eq!(
            err,
            ValuesError::CountExceeded {
                ty: VarType::Real,
                capacity: 1
            }
        );
        assert_eq!(buf, before);
    }

    #[test]
    fn write_reals_is_all_or_nothing() {
        let mut buf = mixed_buffer();
        let before = buf.clone();
        let targets = [IndexDescriptor::real(0), IndexDescriptor::real(9)];
        assert!(write_reals(&mut buf, &targets, &[1.0, 2.0]).is_err());
        assert_eq!(buf, before);
    }
}
