use crate::extraction::ExtractionError;

/// Recognizes text in a single encoded raster image. Implementations are
/// synchronous; callers run them on the blocking pool.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError>;
}

/// Stand-in used when the binary was built without the `ocr` feature.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn recognize(&self, _image: &[u8]) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }
}

/// Joins configured language codes the way Tesseract expects (`eng+deu`).
pub fn language_string(languages: &[String]) -> String {
    if languages.is_empty() {
        "eng".to_string()
    } else {
        languages.join("+")
    }
}

#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    languages: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(languages: &[String]) -> Self {
        Self {
            languages: language_string(languages),
        }
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError> {
        use std::io::Cursor;

        let _span = tracing::info_span!("extraction.ocr").entered();

        let img = image::load_from_memory(image)
            .map_err(|e| ExtractionError::Ocr(format!("Failed to load image: {e}")))?;

        // leptess only reads formats leptonica understands
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ExtractionError::Ocr(format!("Failed to convert image: {e}")))?;

        let mut lt = leptess::LepTess::new(None, &self.languages)
            .map_err(|e| ExtractionError::Ocr(format!("Failed to initialize Tesseract: {e}")))?;
        lt.set_image_from_mem(&png)
            .map_err(|e| ExtractionError::Ocr(format!("Failed to set image for OCR: {e}")))?;
        lt.get_utf8_text()
            .map_err(|e| ExtractionError::Ocr(e.to_string()))
    }
}

/// Picks the OCR engine compiled into this binary.
#[cfg(feature = "ocr")]
pub fn default_engine(languages: &[String]) -> std::sync::Arc<dyn OcrEngine> {
    std::sync::Arc::new(TesseractOcr::new(languages))
}

#[cfg(not(feature = "ocr"))]
pub fn default_engine(languages: &[String]) -> std::sync::Arc<dyn OcrEngine> {
    tracing::warn!(
        languages = %language_string(languages),
        "Built without the `ocr` feature; scanned PDFs will not be recognized"
    );
    std::sync::Arc::new(UnavailableOcr)
}
