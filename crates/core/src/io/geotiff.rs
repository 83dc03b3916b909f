//! Native GeoTIFF reading and writing on top of the `tiff` crate
//!
//! Georeferencing is carried by ModelPixelScale + ModelTiepoint, the CRS by
//! an EPSG code in the GeoKeyDirectory and the nodata sentinel by the
//! GDAL_NODATA ASCII tag. Rasters are written as single-band 32-bit float.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression as TiffCompression, Deflate, Lzw, Uncompressed};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKindStandard};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelWindow, Raster, RasterElement};

// GeoKey ids
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Compression applied to written rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    Lzw,
    #[default]
    Deflate,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: Compression,
}

/// Georeferencing read from a GeoTIFF header
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffMetadata {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
}

/// Decoder wrapper that reads the header once and then decodes either the
/// full image or only the tiles/strips covering a window.
pub struct GeoTiffReader<R: Read + Seek> {
    decoder: Decoder<R>,
    metadata: GeoTiffMetadata,
}

impl<R: Read + Seek> GeoTiffReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut decoder = Decoder::new(reader).map_err(tiff_err("cannot open TIFF"))?;

        match decoder.colortype().map_err(tiff_err("cannot read color type"))? {
            ColorType::Gray(_) => {}
            other => {
                return Err(Error::UnsupportedDataType(format!(
                    "expected a single-band image, found {:?}",
                    other
                )))
            }
        }

        let (width, height) = decoder
            .dimensions()
            .map_err(tiff_err("cannot read dimensions"))?;

        let transform = read_geotransform(&mut decoder)?;
        let crs = read_crs(&mut decoder)?;
        let nodata = read_nodata(&mut decoder)?;

        Ok(Self {
            decoder,
            metadata: GeoTiffMetadata {
                width: width as usize,
                height: height as usize,
                transform,
                crs,
                nodata,
            },
        })
    }

    pub fn metadata(&self) -> &GeoTiffMetadata {
        &self.metadata
    }

    /// Decode the whole image
    pub fn read_full<T: RasterElement>(&mut self) -> Result<Raster<T>> {
        let (rows, cols) = (self.metadata.height, self.metadata.width);
        let result = self
            .decoder
            .read_image()
            .map_err(tiff_err("cannot read image data"))?;
        let data = cast_buffer::<T>(result)?;

        let raster = Raster::from_vec(data, rows, cols)?;
        Ok(self.georeference(raster, &PixelWindow::full(cols, rows)))
    }

    /// Decode only the chunks that intersect `window`.
    pub fn read_window<T: RasterElement>(&mut self, window: PixelWindow) -> Result<Raster<T>> {
        let full = PixelWindow::full(self.metadata.width, self.metadata.height);
        let window = window.intersection(&full).ok_or_else(|| Error::IndexOutOfBounds {
            row: window.row_off,
            col: window.col_off,
            rows: full.rows,
            cols: full.cols,
        })?;

        let (chunk_w, chunk_h) = self.decoder.chunk_dimensions();
        let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
        if chunk_w == 0 || chunk_h == 0 {
            return Err(Error::InvalidGeoTiff("zero-sized tile or strip".into()));
        }
        let chunks_across = (full.cols + chunk_w - 1) / chunk_w;

        let mut out = ndarray::Array2::from_elem((window.rows, window.cols), T::default_nodata());

        for chunk_row in window.row_off / chunk_h..(window.row_end() + chunk_h - 1) / chunk_h {
            for chunk_col in window.col_off / chunk_w..(window.col_end() + chunk_w - 1) / chunk_w {
                let index = (chunk_row * chunks_across + chunk_col) as u32;
                let (data_w, data_h) = self.decoder.chunk_data_dimensions(index);
                let chunk = PixelWindow::new(
                    chunk_col * chunk_w,
                    chunk_row * chunk_h,
                    data_w as usize,
                    data_h as usize,
                );
                let Some(overlap) = chunk.intersection(&window) else {
                    continue;
                };

                let result = self
                    .decoder
                    .read_chunk(index)
                    .map_err(tiff_err("cannot read chunk"))?;
                let values = cast_buffer::<T>(result)?;
                if values.len() < chunk.len() {
                    return Err(Error::InvalidGeoTiff(format!(
                        "chunk {} holds {} values, expected {}",
                        index,
                        values.len(),
                        chunk.len()
                    )));
                }

                for row in overlap.row_off..overlap.row_end() {
                    let src = (row - chunk.row_off) * chunk.cols;
                    for col in overlap.col_off..overlap.col_end() {
                        out[[row - window.row_off, col - window.col_off]] =
                            values[src + col - chunk.col_off];
                    }
                }
            }
        }

        Ok(self.georeference(Raster::from_array(out), &window))
    }

    fn georeference<T: RasterElement>(&self, raster: Raster<T>, window: &PixelWindow) -> Raster<T> {
        let nodata = self.metadata.nodata.and_then(num_traits::cast::<f64, T>);
        raster.with_georef(
            self.metadata.transform.window(window.col_off, window.row_off),
            self.metadata.crs.clone(),
            nodata,
        )
    }
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    GeoTiffReader::new(BufReader::new(file))?.read_full()
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    GeoTiffReader::new(Cursor::new(data))?.read_full()
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, options)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: &GeoTiffOptions,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options)?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("cannot create TIFF encoder"))?;
    let (rows, cols) = raster.shape();
    let (width, height) = (cols as u32, rows as u32);

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    match options.compression {
        Compression::None => {
            let image = encoder
                .new_image_with_compression::<Gray32Float, _>(width, height, Uncompressed)
                .map_err(tiff_err("cannot create TIFF image"))?;
            write_image(image, raster, &data)
        }
        Compression::Lzw => {
            let image = encoder
                .new_image_with_compression::<Gray32Float, _>(width, height, Lzw::default())
                .map_err(tiff_err("cannot create TIFF image"))?;
            write_image(image, raster, &data)
        }
        Compression::Deflate => {
            let image = encoder
                .new_image_with_compression::<Gray32Float, _>(width, height, Deflate::default())
                .map_err(tiff_err("cannot create TIFF image"))?;
            write_image(image, raster, &data)
        }
    }
}

fn write_image<T, W, D>(
    mut image: ImageEncoder<'_, W, Gray32Float, TiffKindStandard, D>,
    raster: &Raster<T>,
    data: &[f32],
) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    D: TiffCompression,
{
    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tiff_err("cannot write pixel scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tiff_err("cannot write tiepoint tag"))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(tiff_err("cannot write geokey directory"))?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(tiff_err("cannot write nodata tag"))?;
    }

    image
        .write_data(data)
        .map_err(tiff_err("cannot write image data"))?;

    Ok(())
}

/// GeoKeyDirectory entries: header `[1, 1, 0, n]` then `n` x `[id, location, count, value]`.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok());
    let geographic = code.map_or(false, |c| crate::crs::is_wgs84(c as u32));

    let model_type = if geographic { MODEL_TYPE_GEOGRAPHIC } else { MODEL_TYPE_PROJECTED };
    let mut keys = vec![
        [GT_MODEL_TYPE, 0, 1, model_type],
        [GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    if let Some(code) = code {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.push([key, 0, 1, code]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    directory
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = find_f64_vec(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = find_f64_vec(decoder, Tag::ModelTiepointTag)?;

    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) if scale.len() >= 2 && tiepoint.len() >= 6 => {
            // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
        }
        _ => Err(Error::InvalidGeoTiff(
            "missing ModelPixelScale/ModelTiepoint tags".into(),
        )),
    }
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<CRS>> {
    let keys = match decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(tiff_err("cannot read geokey directory"))?
    {
        Some(value) => value
            .into_u16_vec()
            .map_err(tiff_err("malformed geokey directory"))?,
        None => return Ok(None),
    };

    Ok(epsg_from_geokeys(&keys).map(CRS::from_epsg))
}

fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;

    let inline = |id: u16| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| e[3])
            .filter(|&v| v != 0 && v != USER_DEFINED)
    };

    inline(PROJECTED_CS_TYPE)
        .or_else(|| inline(GEOGRAPHIC_TYPE))
        .map(u32::from)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let text = match decoder
        .find_tag(Tag::GdalNodata)
        .map_err(tiff_err("cannot read nodata tag"))?
    {
        Some(value) => value
            .into_string()
            .map_err(tiff_err("malformed nodata tag"))?,
        None => return Ok(None),
    };

    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Ok(Some(f64::NAN)),
        other => other
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::InvalidGeoTiff(format!("invalid GDAL_NODATA value '{}'", text))),
    }
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<Vec<f64>>> {
    decoder
        .find_tag(tag)
        .map_err(tiff_err("cannot read tag"))?
        .map(|v| v.into_f64_vec().map_err(tiff_err("malformed tag")))
        .transpose()
}

fn cast_buffer<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    macro_rules! cast_all {
        ($buf:expr) => {
            $buf.into_iter()
                .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
                .collect()
        };
    }

    Ok(match result {
        DecodingResult::U8(buf) => cast_all!(buf),
        DecodingResult::U16(buf) => cast_all!(buf),
        DecodingResult::U32(buf) => cast_all!(buf),
        DecodingResult::U64(buf) => cast_all!(buf),
        DecodingResult::I8(buf) => cast_all!(buf),
        DecodingResult::I16(buf) => cast_all!(buf),
        DecodingResult::I32(buf) => cast_all!(buf),
        DecodingResult::I64(buf) => cast_all!(buf),
        DecodingResult::F32(buf) => cast_all!(buf),
        DecodingResult::F64(buf) => cast_all!(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF sample format".into())),
    })
}

fn tiff_err(context: &'static str) -> impl Fn(tiff::TiffError) -> Error {
    move |e| Error::InvalidGeoTiff(format!("{}: {}", context, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster<f64> {
        let data = vec![0.1, 0.2, -9999.0, 0.4, 0.5, 0.6];
        Raster::from_vec(data, 2, 3).unwrap().with_georef(
            GeoTransform::new(440_000.0, 4_461_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(32630)),
            Some(-9999.0),
        )
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let raster = sample();
        let bytes = write_geotiff_to_buffer(&raster, &GeoTiffOptions::default()).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32630));
        assert_eq!(back.nodata(), Some(-9999.0));
        assert!((back.get(1, 2).unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_geographic_crs_uses_geographic_key() {
        let keys = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));
        assert_eq!(keys[7], MODEL_TYPE_GEOGRAPHIC);

        let no_crs = geokey_directory(None);
        assert_eq!(no_crs[3], 2);
        assert_eq!(epsg_from_geokeys(&no_crs), None);
    }

    #[test]
    fn test_read_window_matches_full_read() {
        let data: Vec<f64> = (0..64).map(|v| v as f64).collect();
        let raster = Raster::from_vec(data, 8, 8)
            .unwrap()
            .with_georef(GeoTransform::new(0.0, 80.0, 10.0, -10.0), Some(CRS::from_epsg(32630)), None);

        let options = GeoTiffOptions { compression: Compression::None };
        let bytes = write_geotiff_to_buffer(&raster, &options).unwrap();

        let mut reader = GeoTiffReader::new(Cursor::new(bytes.as_slice())).unwrap();
        let window: Raster<f64> = reader.read_window(PixelWindow::new(2, 3, 4, 2)).unwrap();

        assert_eq!(window.shape(), (2, 4));
        assert_eq!(window.get(0, 0).unwrap(), 26.0);
        assert_eq!(window.get(1, 3).unwrap(), 37.0);
        assert_eq!(window.transform().origin_x, 20.0);
        assert_eq!(window.transform().origin_y, 50.0);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi_test.tif");

        write_geotiff(&sample(), &path, &GeoTiffOptions::default()).unwrap();
        let back: Raster<f32> = read_geotiff(&path).unwrap();
        assert_eq!(back.nodata(), Some(-9999.0_f32));
        assert_eq!(back.get(0, 2).unwrap(), -9999.0_f32);
    }
}
